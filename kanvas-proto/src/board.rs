//! Board aggregate as exchanged with the command layer.
//!
//! A [`Board`] owns its columns and members; each [`Column`] owns the
//! [`TaskSummary`] projections rendered on the board. [`TaskDetail`] is the
//! lazily fetched superset of a summary and is not kept normalized against it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{BoardId, ColumnId, MemberId, Rank, TaskId, UserId};

/// Who can see a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Visible to every member of the owning workspace.
    WorkspacePublic,
    /// Visible to board members only.
    Private,
}

/// Per-board role of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardRole {
    /// Full control including membership and settings.
    Admin,
    /// May edit columns and tasks.
    Editor,
    /// Read-only access.
    Viewer,
}

impl BoardRole {
    /// Whether this role may issue write commands.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Open work.
    #[default]
    Active,
    /// Completed work.
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Task priority. Absence of a priority is modelled as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Urgent.
    High,
    /// Normal.
    Medium,
    /// Whenever.
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// A board membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Membership identifier.
    pub member_id: MemberId,
    /// The user behind the membership.
    pub user_id: UserId,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Login handle.
    pub username: String,
    /// Avatar background colour (CSS colour string).
    pub avatar_color: String,
    /// Role on this board.
    pub board_role: BoardRole,
    /// When the user joined the board.
    #[serde(default)]
    pub joined_at: Option<NaiveDateTime>,
}

/// Projection of a task as rendered inside a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// Task identifier.
    pub task_id: TaskId,
    /// Rank within the owning column.
    pub order_index: Rank,
    /// Owning column.
    pub column_id: ColumnId,
    /// Title shown on the card.
    pub title: String,
    /// Optional due instant.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Optional priority.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Assigned memberships.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assignee_ids: Vec<MemberId>,
    /// Server-derived: deadline has passed.
    #[serde(default)]
    pub is_expired: bool,
}

impl TaskSummary {
    /// Builds the summary a freshly created task starts with: active, no
    /// priority, deadline or assignees.
    #[must_use]
    pub fn fresh(task_id: TaskId, column_id: ColumnId, order_index: Rank, title: String) -> Self {
        Self {
            task_id,
            order_index,
            column_id,
            title,
            deadline: None,
            status: TaskStatus::Active,
            priority: None,
            assignee_ids: Vec::new(),
            is_expired: false,
        }
    }
}

/// Full task as returned by the task detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    /// Task identifier.
    pub task_id: TaskId,
    /// Rank within the owning column.
    pub order_index: Rank,
    /// Owning column.
    pub column_id: ColumnId,
    /// Title.
    pub title: String,
    /// Long-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time (server local time).
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Optional due instant.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Optional priority.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Assigned memberships.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assignee_ids: Vec<MemberId>,
    /// Server-derived: deadline has passed.
    #[serde(default)]
    pub is_expired: bool,
}

impl TaskDetail {
    /// Projects the detail down to the summary shape.
    #[must_use]
    pub fn to_summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.task_id,
            order_index: self.order_index,
            column_id: self.column_id,
            title: self.title.clone(),
            deadline: self.deadline,
            status: self.status,
            priority: self.priority,
            assignee_ids: self.assignee_ids.clone(),
            is_expired: self.is_expired,
        }
    }
}

/// A column and the task summaries it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column identifier.
    pub column_id: ColumnId,
    /// Rank within the board.
    pub order_index: Rank,
    /// Header text.
    pub name: String,
    /// Tasks, kept sorted ascending by rank.
    #[serde(rename = "taskProjections", default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<TaskSummary>,
}

impl Column {
    /// An empty column.
    #[must_use]
    pub const fn empty(column_id: ColumnId, order_index: Rank, name: String) -> Self {
        Self {
            column_id,
            order_index,
            name,
            tasks: Vec::new(),
        }
    }

    /// Looks up a task in this column.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}

/// Root aggregate for one open board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Board identifier.
    pub board_id: BoardId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time (server local time).
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Who can see the board.
    pub visibility: Visibility,
    /// The viewer's effective role.
    pub board_role: BoardRole,
    /// Derived from the role: writes are not permitted.
    #[serde(default)]
    pub readonly: bool,
    /// Memberships.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub board_members: Vec<Member>,
    /// Columns, kept sorted ascending by rank.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub columns: Vec<Column>,
}

impl Board {
    /// Looks up a column.
    #[must_use]
    pub fn column(&self, column_id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    /// Finds a task in whichever column holds it.
    #[must_use]
    pub fn find_task(&self, task_id: TaskId) -> Option<&TaskSummary> {
        self.columns.iter().find_map(|c| c.task(task_id))
    }

    /// Looks up a membership.
    #[must_use]
    pub fn member(&self, member_id: MemberId) -> Option<&Member> {
        self.board_members.iter().find(|m| m.member_id == member_id)
    }
}

/// Deserializes `null` (or a missing field, with `#[serde(default)]`) as an
/// empty vector.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
