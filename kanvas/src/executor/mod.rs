//! Optimistic command executor.
//!
//! Every command runs in two phases. The synchronous phase validates the
//! input, applies the optimistic patch to the [`EntityStore`], and returns a
//! [`PendingCommand`]. Awaiting (or spawning) that handle performs the remote
//! call and then reconciles, rolls back, or retains the optimistic state:
//!
//! | command                         | on success          | on failure        |
//! |---------------------------------|---------------------|-------------------|
//! | create / delete / remove member | reconcile + notice  | roll back + error |
//! | rename / field edit / assign    | reconcile           | retain + error    |
//! | reorder                         | authoritative rank  | retain + error    |
//! | board settings                  | reconcile + notice  | retain + error    |
//!
//! A result that arrives after the board was closed or replaced is dropped
//! without touching the store or emitting a notice.

mod board;
mod column;
mod task;

use std::collections::HashMap;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use kanvas_proto::board::{Board, TaskDetail};
use kanvas_proto::ids::{BoardId, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::notice::{self, Notice};
use crate::remote::{BoardCommands, RemoteError};
use crate::store::EntityStore;

/// Finished commands kept for [`OptimisticExecutor::phase`] lookups before
/// they are pruned.
const MAX_TRACKED_COMMANDS: usize = 1024;

/// Input rejected before any store or network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The value is empty after trimming.
    #[error("{field} must not be empty")]
    Empty {
        /// Which input.
        field: &'static str,
    },
    /// The value is longer than allowed.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Which input.
        field: &'static str,
        /// Maximum length in characters.
        max: usize,
    },
}

/// Reasons a command is refused synchronously.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Input failed validation.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// The board does not accept writes from this viewer.
    #[error("board is read-only")]
    ReadOnly,
    /// No board is loaded.
    #[error("no active board")]
    NoActiveBoard,
    /// The targeted entity is not on the board.
    #[error("{0} not found")]
    NotFound(String),
}

/// Limits and constants used by the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Spacing used for provisional ranks.
    pub rank_step: f64,
    /// Maximum column name length in characters.
    pub max_column_name_len: usize,
    /// Maximum task title length in characters.
    pub max_task_title_len: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            rank_step: 1000.0,
            max_column_name_len: 255,
            max_task_title_len: 255,
        }
    }
}

/// Identifier of one issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(Uuid);

impl CommandId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which operation a command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Append a column to the board.
    CreateColumn,
    /// Change a column's name.
    RenameColumn,
    /// Remove a column and its tasks.
    DeleteColumn,
    /// Reposition a column among its siblings.
    MoveColumn,
    /// Append a task to a column.
    CreateTask,
    /// Overwrite task fields.
    UpdateTask,
    /// Reposition a task, possibly into another column.
    MoveTask,
    /// Remove a task.
    DeleteTask,
    /// Add a member to a task's assignees.
    AssignTask,
    /// Drop a member from a task's assignees.
    UnassignTask,
    /// Save board settings.
    UpdateBoard,
    /// Change a member's board role.
    ChangeRole,
    /// Remove a member from the board.
    RemoveMember,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateColumn => "create-column",
            Self::RenameColumn => "rename-column",
            Self::DeleteColumn => "delete-column",
            Self::MoveColumn => "move-column",
            Self::CreateTask => "create-task",
            Self::UpdateTask => "update-task",
            Self::MoveTask => "move-task",
            Self::DeleteTask => "delete-task",
            Self::AssignTask => "assign-task",
            Self::UnassignTask => "unassign-task",
            Self::UpdateBoard => "update-board",
            Self::ChangeRole => "change-role",
            Self::RemoveMember => "remove-member",
        };
        f.write_str(name)
    }
}

/// Lifecycle of an issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPhase {
    /// Optimistic patch applied, remote call outstanding.
    Applying,
    /// Remote call succeeded and authoritative fields were applied.
    Reconciled,
    /// Remote call failed and the optimistic patch was reverted.
    RolledBack,
    /// Remote call failed and the optimistic value was kept.
    Retained,
    /// The board changed before the result arrived; the result was dropped.
    Stale,
}

/// Final report of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Command identifier.
    pub id: CommandId,
    /// Operation performed.
    pub kind: CommandKind,
    /// Terminal phase.
    pub phase: CommandPhase,
    /// Remote failure, if any.
    pub error: Option<RemoteError>,
}

/// Remote half of a command whose optimistic patch is already applied.
///
/// Await it to drive the remote call and reconciliation, or hand it to
/// [`spawn`](Self::spawn). Dropping it without polling leaves the optimistic
/// state in place and never contacts the remote side.
#[must_use = "the remote call only runs when the command is awaited or spawned"]
pub struct PendingCommand {
    id: CommandId,
    kind: CommandKind,
    fut: BoxFuture<'static, CommandOutcome>,
}

impl PendingCommand {
    /// Identifier for phase lookups.
    pub const fn id(&self) -> CommandId {
        self.id
    }

    /// Operation performed.
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Runs the remote half on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<CommandOutcome> {
        tokio::spawn(self.fut)
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl IntoFuture for PendingCommand {
    type Output = CommandOutcome;
    type IntoFuture = BoxFuture<'static, CommandOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        self.fut
    }
}

struct Shared<R> {
    store: EntityStore,
    remote: Arc<R>,
    notices: mpsc::Sender<Notice>,
    phases: Mutex<HashMap<CommandId, CommandPhase>>,
    next_temporary: AtomicI64,
    detail: Mutex<Option<TaskDetail>>,
    config: ExecutorConfig,
    viewer: UserId,
}

impl<R> Shared<R> {
    fn track(&self, id: CommandId, phase: CommandPhase) {
        let mut phases = self.phases.lock();
        if phases.len() >= MAX_TRACKED_COMMANDS {
            phases.retain(|_, p| *p == CommandPhase::Applying);
        }
        phases.insert(id, phase);
    }

    fn notify(&self, notice: Notice) {
        notice::emit(&self.notices, notice);
    }

    fn fail(&self, error: &RemoteError) {
        self.notify(Notice::Error(error.user_message()));
    }

    /// Applies `f` to the open task detail, if any.
    fn with_detail(&self, f: impl FnOnce(&mut TaskDetail)) {
        if let Some(detail) = self.detail.lock().as_mut() {
            f(detail);
        }
    }
}

/// Issues commands against the loaded board.
///
/// Cloning yields another handle to the same executor.
pub struct OptimisticExecutor<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for OptimisticExecutor<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: BoardCommands> OptimisticExecutor<R> {
    /// Creates an executor with its own notice channel.
    ///
    /// Returns the executor and the receiver for [`Notice`]s the UI layer
    /// should consume.
    pub fn new(
        store: EntityStore,
        remote: Arc<R>,
        viewer: UserId,
        config: ExecutorConfig,
        notice_buffer: usize,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(notice_buffer);
        (Self::with_notices(store, remote, viewer, config, tx), rx)
    }

    /// Creates an executor that reports on an existing notice channel.
    pub fn with_notices(
        store: EntityStore,
        remote: Arc<R>,
        viewer: UserId,
        config: ExecutorConfig,
        notices: mpsc::Sender<Notice>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                remote,
                notices,
                phases: Mutex::new(HashMap::new()),
                next_temporary: AtomicI64::new(-1),
                detail: Mutex::new(None),
                config,
                viewer,
            }),
        }
    }

    /// Store this executor patches.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.shared.store
    }

    /// Phase of a command, while it is still tracked.
    #[must_use]
    pub fn phase(&self, id: CommandId) -> Option<CommandPhase> {
        self.shared.phases.lock().get(&id).copied()
    }

    /// Number of commands whose remote call has not settled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared
            .phases
            .lock()
            .values()
            .filter(|p| **p == CommandPhase::Applying)
            .count()
    }

    /// The task detail currently open, if any.
    #[must_use]
    pub fn open_detail(&self) -> Option<TaskDetail> {
        self.shared.detail.lock().clone()
    }

    fn next_temporary(&self) -> i64 {
        self.shared.next_temporary.fetch_sub(1, Ordering::Relaxed)
    }

    fn readable_board(&self) -> Result<Arc<Board>, CommandError> {
        self.shared.store.read().ok_or(CommandError::NoActiveBoard)
    }

    fn writable_board(&self) -> Result<Arc<Board>, CommandError> {
        let board = self.readable_board()?;
        if board.readonly {
            return Err(CommandError::ReadOnly);
        }
        Ok(board)
    }

    /// Wraps the remote half of a command.
    ///
    /// `settle` runs only if `board_id` is still loaded when `request`
    /// resolves; it applies the reconcile or rollback patch and reports the
    /// terminal phase.
    fn dispatch<T, Fut, S>(
        &self,
        kind: CommandKind,
        board_id: BoardId,
        request: Fut,
        settle: S,
    ) -> PendingCommand
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
        S: FnOnce(&Shared<R>, Result<T, RemoteError>) -> CommandPhase + Send + 'static,
    {
        let id = CommandId::new();
        self.shared.track(id, CommandPhase::Applying);
        tracing::debug!(command_id = %id, %kind, board_id = %board_id, "optimistic patch applied");

        let shared = Arc::clone(&self.shared);
        let fut = async move {
            let result = request.await;
            let error = result.as_ref().err().cloned();
            let phase = if shared.store.active_board_id() == Some(board_id) {
                settle(&shared, result)
            } else {
                tracing::info!(command_id = %id, %kind, board_id = %board_id, "board no longer active; result dropped");
                CommandPhase::Stale
            };
            match phase {
                CommandPhase::RolledBack | CommandPhase::Retained => {
                    tracing::warn!(command_id = %id, %kind, ?phase, error = ?error, "command failed");
                }
                _ => tracing::debug!(command_id = %id, %kind, ?phase, "command settled"),
            }
            shared.track(id, phase);
            CommandOutcome {
                id,
                kind,
                phase,
                error,
            }
        };

        PendingCommand {
            id,
            kind,
            fut: fut.boxed(),
        }
    }
}

/// Trims `raw` and checks it against `max` characters.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] if nothing is left after trimming, or
/// [`ValidationError::TooLong`] if the trimmed value is longer than `max`.
pub fn validate_name(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}
