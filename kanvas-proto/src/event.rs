//! Real-time messages delivered on the board and user topics.
//!
//! Board messages use the envelope `{"type": TAG, "payload": {...}}` and are
//! modelled as the closed enum [`BoardEvent`]. Nullable payload fields are
//! `Option`s where `None` means "field unchanged".

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{BoardRole, Member, Priority, TaskStatus, Visibility};
use crate::ids::{ColumnId, MemberId, Rank, TaskId, UserId};

/// A mutation event for one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardEvent {
    /// Board settings changed.
    BoardUpdated(BoardUpdated),
    /// A user joined the board.
    MemberJoined(Member),
    /// A membership was revoked.
    MemberRemoved(MemberRemoved),
    /// A member's role changed.
    RoleChanged(RoleChanged),
    /// A column was added.
    ColumnCreated(ColumnCreated),
    /// A column was renamed.
    ColumnUpdated(ColumnUpdated),
    /// A column was re-ranked.
    ColumnMoved(ColumnMoved),
    /// A column and its tasks were deleted.
    ColumnDeleted(ColumnDeleted),
    /// A task was added.
    TaskCreated(TaskCreated),
    /// Task fields changed.
    TaskUpdated(TaskUpdated),
    /// A task was re-ranked, possibly into another column.
    TaskMoved(TaskMoved),
    /// A task was deleted.
    TaskDeleted(TaskDeleted),
    /// A member was assigned to a task.
    TaskAssigned(TaskAssignment),
    /// A member was unassigned from a task.
    TaskUnassigned(TaskAssignment),
}

impl BoardEvent {
    /// The wire tag of this event.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::BoardUpdated(_) => "BOARD_UPDATED",
            Self::MemberJoined(_) => "MEMBER_JOINED",
            Self::MemberRemoved(_) => "MEMBER_REMOVED",
            Self::RoleChanged(_) => "ROLE_CHANGED",
            Self::ColumnCreated(_) => "COLUMN_CREATED",
            Self::ColumnUpdated(_) => "COLUMN_UPDATED",
            Self::ColumnMoved(_) => "COLUMN_MOVED",
            Self::ColumnDeleted(_) => "COLUMN_DELETED",
            Self::TaskCreated(_) => "TASK_CREATED",
            Self::TaskUpdated(_) => "TASK_UPDATED",
            Self::TaskMoved(_) => "TASK_MOVED",
            Self::TaskDeleted(_) => "TASK_DELETED",
            Self::TaskAssigned(_) => "TASK_ASSIGNED",
            Self::TaskUnassigned(_) => "TASK_UNASSIGNED",
        }
    }
}

/// `BOARD_UPDATED` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdated {
    /// New name, if changed.
    #[serde(default)]
    pub name: Option<String>,
    /// New description, if changed.
    #[serde(default)]
    pub description: Option<String>,
    /// New visibility, if changed.
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// `MEMBER_REMOVED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRemoved {
    /// Revoked membership.
    pub member_id: MemberId,
}

/// `ROLE_CHANGED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChanged {
    /// Membership concerned.
    pub member_id: MemberId,
    /// Its new role.
    pub role: BoardRole,
}

/// `COLUMN_CREATED` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCreated {
    /// New column.
    pub column_id: ColumnId,
    /// Its rank.
    pub order_index: Rank,
    /// Its name.
    pub name: String,
}

/// `COLUMN_UPDATED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdated {
    /// Renamed column.
    pub column_id: ColumnId,
    /// Its new name.
    pub column_name: String,
}

/// `COLUMN_MOVED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMoved {
    /// Moved column.
    pub column_id: ColumnId,
    /// Its new rank.
    pub new_order_index: Rank,
}

/// `COLUMN_DELETED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDeleted {
    /// Deleted column.
    pub column_id: ColumnId,
}

/// `TASK_CREATED` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    /// Owning column.
    pub column_id: ColumnId,
    /// New task.
    pub task_id: TaskId,
    /// Its rank within the column.
    pub order_index: Rank,
    /// Its title.
    pub title: String,
}

/// `TASK_UPDATED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdated {
    /// Task concerned.
    pub task_id: TaskId,
    /// New title, if changed.
    #[serde(default)]
    pub title: Option<String>,
    /// New deadline, if changed.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// New priority, if changed.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// New status, if changed.
    #[serde(default)]
    pub task_status: Option<TaskStatus>,
    /// Current expiry flag; always applied.
    #[serde(default)]
    pub is_expired: bool,
}

/// `TASK_MOVED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMoved {
    /// Column the task was in.
    pub before_column_id: ColumnId,
    /// Column the task is now in.
    pub target_column_id: ColumnId,
    /// Moved task.
    pub task_id: TaskId,
    /// Its new rank.
    pub new_order_index: Rank,
}

impl TaskMoved {
    /// Whether the move stays within one column.
    #[must_use]
    pub fn is_same_column(&self) -> bool {
        self.before_column_id == self.target_column_id
    }
}

/// `TASK_DELETED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    /// Deleted task.
    pub task_id: TaskId,
}

/// `TASK_ASSIGNED` / `TASK_UNASSIGNED` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    /// Task concerned.
    pub task_id: TaskId,
    /// Membership (un)assigned.
    pub board_member_id: MemberId,
}

/// Kind of per-user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Invitation to a workspace or board.
    Invitation,
    /// The user was assigned to a task.
    Assignment,
    /// The user lost access to a board.
    RemovedFromBoard,
}

/// Read state of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Not opened yet.
    Unread,
    /// Seen by the user.
    Read,
    /// Hidden from the user's list.
    Dismissed,
}

/// Message delivered on a user's private topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Server identifier of the notification.
    pub notification_id: i64,
    /// Recipient.
    pub user_id: UserId,
    /// What happened.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Read state.
    pub status: NotificationStatus,
    /// When it was sent (server local time).
    #[serde(default)]
    pub sent_at: Option<NaiveDateTime>,
    /// Open, kind-specific details.
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}
