//! Drag session controller.
//!
//! A gesture moves through `Idle -> Dragging -> Idle`. Picking up touches
//! nothing; the drop decides whether the gesture was a no-op, a cancellation
//! or a move, and a move is handed to the [`OptimisticExecutor`] whose
//! synchronous phase snaps the store into the new order. The controller
//! spawns the remote half and never waits for it.

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use kanvas_proto::board::Board;
use kanvas_proto::ids::{ColumnId, TaskId};

use crate::executor::{CommandError, CommandKind, CommandOutcome, OptimisticExecutor, PendingCommand};
use crate::ordering::{self, plan_reorder, plan_transfer};
use crate::remote::BoardCommands;

/// What is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// A whole column, reordered within the board.
    Column,
    /// A task card, moved within or across columns.
    Task,
}

/// A list that holds draggable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// The board's column list.
    Board,
    /// One column's task list.
    Column(ColumnId),
}

/// Where a gesture started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSource {
    /// Kind of item picked up.
    pub kind: DragKind,
    /// List it was picked from.
    pub container: Container,
    /// Its index in that list.
    pub index: usize,
}

/// Where a gesture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    /// List it was dropped into.
    pub container: Container,
    /// Index it should land on.
    pub index: usize,
}

/// Reasons a pick-up is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    /// Another gesture is in progress.
    #[error("a drag is already in progress")]
    AlreadyDragging,
    /// The board does not accept writes from this viewer.
    #[error("board is read-only")]
    ReadOnly,
    /// No board is loaded.
    #[error("no active board")]
    NoActiveBoard,
}

/// Result of a drop.
#[derive(Debug)]
pub enum DropOutcome {
    /// The item landed where it started; nothing happened.
    Unchanged,
    /// No gesture, no valid target, a target of the wrong kind, or a source
    /// that no longer exists.
    Cancelled,
    /// The executor refused the move; the store is untouched.
    Rejected(CommandError),
    /// The move was applied locally and its remote half is running.
    Dispatched {
        /// Operation issued.
        command: CommandKind,
        /// Remote half of the command.
        handle: JoinHandle<CommandOutcome>,
    },
}

/// Turns drag gestures into reorder commands.
pub struct DragController<R> {
    executor: OptimisticExecutor<R>,
    active: Mutex<Option<DragSource>>,
}

impl<R: BoardCommands> DragController<R> {
    /// Creates an idle controller issuing commands through `executor`.
    pub fn new(executor: OptimisticExecutor<R>) -> Self {
        Self {
            executor,
            active: Mutex::new(None),
        }
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Starts a gesture.
    ///
    /// # Errors
    ///
    /// Returns [`DragError`] if a gesture is already running, no board is
    /// loaded, or the board is read-only.
    pub fn pick_up(&self, source: DragSource) -> Result<(), DragError> {
        let board = self.executor.store().read().ok_or(DragError::NoActiveBoard)?;
        if board.readonly {
            return Err(DragError::ReadOnly);
        }
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(DragError::AlreadyDragging);
        }
        tracing::debug!(?source, "drag started");
        *active = Some(source);
        Ok(())
    }

    /// Abandons the current gesture without touching the store.
    pub fn cancel(&self) {
        if self.active.lock().take().is_some() {
            tracing::debug!("drag cancelled");
        }
    }

    /// Ends the current gesture at `target`; `None` means it was released
    /// outside any valid target.
    ///
    /// Must be called from within a tokio runtime when the drop moves
    /// something, since the remote half is spawned.
    pub fn drop_at(&self, target: Option<DropTarget>) -> DropOutcome {
        let Some(source) = self.active.lock().take() else {
            return DropOutcome::Cancelled;
        };
        let Some(target) = target else {
            tracing::debug!(?source, "drag released outside a target");
            return DropOutcome::Cancelled;
        };
        let Some(board) = self.executor.store().read() else {
            return DropOutcome::Cancelled;
        };
        let planned = match (source.kind, source.container, target.container) {
            (DragKind::Column, Container::Board, Container::Board) => {
                self.drop_column(&board, source.index, target.index)
            }
            (DragKind::Task, Container::Column(from), Container::Column(to)) => {
                self.drop_task(&board, from, source.index, to, target.index)
            }
            _ => {
                tracing::debug!(?source, ?target, "drop target does not accept this item");
                return DropOutcome::Cancelled;
            }
        };
        match planned {
            Planned::Invalid => {
                tracing::debug!(?source, ?target, "drop refers to a list or item that is gone");
                DropOutcome::Cancelled
            }
            Planned::InPlace => DropOutcome::Unchanged,
            Planned::Move(Err(e)) => {
                tracing::warn!(error = %e, "drop rejected");
                DropOutcome::Rejected(e)
            }
            Planned::Move(Ok(pending)) => {
                let command = pending.kind();
                DropOutcome::Dispatched {
                    command,
                    handle: pending.spawn(),
                }
            }
        }
    }

    fn drop_column(&self, board: &Board, from: usize, to: usize) -> Planned {
        if from >= board.columns.len() {
            return Planned::Invalid;
        }
        let known = |id: ColumnId| !id.is_temporary();
        match plan_reorder(&ordering::ids(&board.columns), from, to, known) {
            Some(plan) => Planned::Move(self.executor.reorder_column(&plan)),
            None => Planned::InPlace,
        }
    }

    fn drop_task(
        &self,
        board: &Board,
        from_column: ColumnId,
        from: usize,
        to_column: ColumnId,
        to: usize,
    ) -> Planned {
        let (Some(source), Some(destination)) = (board.column(from_column), board.column(to_column))
        else {
            return Planned::Invalid;
        };
        if from >= source.tasks.len() {
            return Planned::Invalid;
        }
        let known = |id: TaskId| !id.is_temporary();
        let source = ordering::ids(&source.tasks);
        let plan = if from_column == to_column {
            plan_reorder(&source, from, to, known)
        } else {
            plan_transfer(&source, &ordering::ids(&destination.tasks), from, to, known)
        };
        match plan {
            Some(plan) => Planned::Move(self.executor.reorder_task(&plan, to_column)),
            None => Planned::InPlace,
        }
    }
}

/// How a drop resolved before anything was dispatched.
enum Planned {
    /// The dragged item or one of the lists no longer exists.
    Invalid,
    /// The item would land where it is.
    InPlace,
    /// A move was issued, or refused by the executor.
    Move(Result<PendingCommand, CommandError>),
}
