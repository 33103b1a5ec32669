//! Request and response bodies for the remote command layer.
//!
//! Optional request fields are omitted from the JSON when `None`; the command
//! layer treats an absent field as "leave unchanged".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{BoardRole, Priority, TaskStatus, Visibility};
use crate::ids::{ColumnId, MemberId, Rank, TaskId, UserId};

/// Body for creating or renaming a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRequest {
    /// Column header text (already trimmed and validated).
    pub name: String,
}

/// Authoritative state of a freshly created column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnResponse {
    /// Server-assigned identifier.
    pub column_id: ColumnId,
    /// Stored name.
    pub name: String,
    /// Server-assigned rank.
    pub order_index: Rank,
}

/// Neighbor-relative column move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveColumnRequest {
    /// Column being moved.
    pub column_id: ColumnId,
    /// Column that should end up immediately before it.
    pub preceding_column_id: Option<ColumnId>,
    /// Column that should end up immediately after it.
    pub following_column_id: Option<ColumnId>,
}

/// Authoritative rank after a column move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovedColumn {
    /// Column that moved.
    pub column_id: ColumnId,
    /// Its new rank.
    pub order_index: Rank,
}

/// Body for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Column the task is created in.
    pub column_id: ColumnId,
    /// Title (already trimmed and validated).
    pub title: String,
}

/// Authoritative state of a freshly created task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTask {
    /// Server-assigned identifier.
    pub task_id: TaskId,
    /// Owning column.
    pub column_id: ColumnId,
    /// Server-assigned rank.
    pub order_index: Rank,
    /// Server-derived expiry flag.
    #[serde(default)]
    pub is_expired: bool,
}

/// Partial task update. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateRequest {
    /// Task being edited.
    pub task_id: TaskId,
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskUpdateRequest {
    /// An update for `task_id` that changes nothing yet.
    #[must_use]
    pub const fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id,
            title: None,
            description: None,
            deadline: None,
            priority: None,
            status: None,
        }
    }

    /// Whether no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }
}

/// Neighbor-relative task move, possibly across columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    /// Destination column (equal to the source for a same-column reorder).
    pub target_column_id: ColumnId,
    /// Task being moved.
    pub task_id: TaskId,
    /// Task that should end up immediately before it.
    pub preceding_task_id: Option<TaskId>,
    /// Task that should end up immediately after it.
    pub following_task_id: Option<TaskId>,
}

/// Authoritative placement after a task move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovedTask {
    /// Task that moved.
    pub task_id: TaskId,
    /// Column now holding it.
    pub column_id: ColumnId,
    /// Its new rank.
    pub order_index: Rank,
}

/// Body for assigning or unassigning a member to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    /// Task concerned.
    pub task_id: TaskId,
    /// Membership being (un)assigned.
    pub member_id: MemberId,
    /// User behind that membership.
    pub user_id: UserId,
    /// User performing the change.
    pub assigner_id: UserId,
    /// Board name, used by the notification service.
    pub board_name: String,
}

/// Board settings save. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdateRequest {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Body for changing a member's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequest {
    /// Membership concerned.
    pub member_id: MemberId,
    /// Role to grant.
    pub role: BoardRole,
}
