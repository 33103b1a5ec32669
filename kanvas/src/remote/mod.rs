//! Remote command layer.
//!
//! [`BoardCommands`] is the request/response surface of the board authority.
//! The executor only talks to the authority through this trait, so tests and
//! offline use can swap in [`memory::InMemoryBoardService`].

pub mod memory;

use std::future::Future;

use kanvas_proto::board::{Board, TaskDetail};
use kanvas_proto::command::{
    AssignmentRequest, BoardUpdateRequest, ColumnRequest, ColumnResponse, CreatedTask,
    MoveColumnRequest, MoveTaskRequest, MovedColumn, MovedTask, RoleChangeRequest, TaskRequest,
    TaskUpdateRequest,
};
use kanvas_proto::ids::{BoardId, ColumnId, MemberId, TaskId};

use crate::notice::GENERIC_FAILURE;

/// Failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never got an answer.
    #[error("network error: {0}")]
    Network(String),

    /// The authority answered with an error status.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Server-provided message, possibly empty.
        message: String,
    },
}

impl RemoteError {
    /// Shorthand for a 404 rejection.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Rejected {
            status: 404,
            message: what.into(),
        }
    }

    /// Text to show the user: the server message when there is one,
    /// otherwise a generic fallback.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Request/response commands offered by the board authority.
///
/// Every method is scoped to one board. Implementations must be cheap to
/// share behind an `Arc`; the returned futures must not borrow `self`
/// beyond the call.
pub trait BoardCommands: Send + Sync + 'static {
    /// Fetches the full board.
    fn get_board(&self, board_id: BoardId)
    -> impl Future<Output = Result<Board, RemoteError>> + Send;

    /// Fetches one task's detail.
    fn get_task(
        &self,
        board_id: BoardId,
        task_id: TaskId,
    ) -> impl Future<Output = Result<TaskDetail, RemoteError>> + Send;

    /// Creates a column after the last one.
    fn create_column(
        &self,
        board_id: BoardId,
        request: ColumnRequest,
    ) -> impl Future<Output = Result<ColumnResponse, RemoteError>> + Send;

    /// Renames a column.
    fn rename_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
        request: ColumnRequest,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Deletes a column and its tasks.
    fn delete_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Moves a column between two neighbors.
    fn move_column(
        &self,
        board_id: BoardId,
        request: MoveColumnRequest,
    ) -> impl Future<Output = Result<MovedColumn, RemoteError>> + Send;

    /// Creates a task at the end of a column.
    fn create_task(
        &self,
        board_id: BoardId,
        request: TaskRequest,
    ) -> impl Future<Output = Result<CreatedTask, RemoteError>> + Send;

    /// Edits task fields and returns the stored task.
    fn update_task(
        &self,
        board_id: BoardId,
        request: TaskUpdateRequest,
    ) -> impl Future<Output = Result<TaskDetail, RemoteError>> + Send;

    /// Moves a task between two neighbors, possibly into another column.
    fn move_task(
        &self,
        board_id: BoardId,
        request: MoveTaskRequest,
    ) -> impl Future<Output = Result<MovedTask, RemoteError>> + Send;

    /// Deletes a task.
    fn delete_task(
        &self,
        board_id: BoardId,
        task_id: TaskId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Adds an assignee.
    fn assign_task(
        &self,
        board_id: BoardId,
        request: AssignmentRequest,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Removes an assignee.
    fn unassign_task(
        &self,
        board_id: BoardId,
        request: AssignmentRequest,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Saves board settings.
    fn update_board(
        &self,
        board_id: BoardId,
        request: BoardUpdateRequest,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Changes a member's role.
    fn change_member_role(
        &self,
        board_id: BoardId,
        request: RoleChangeRequest,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Removes a member from the board.
    fn remove_member(
        &self,
        board_id: BoardId,
        member_id: MemberId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
