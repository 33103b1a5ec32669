//! Applies real-time board events to the entity store.
//!
//! [`apply_event`] is the exhaustive, pure mapping from event to patch;
//! [`EventReconciler`] adds decoding, the active-board guard, and logging.
//! Undecodable frames are reported and dropped, never propagated.

use kanvas_proto::board::{Board, Column, TaskSummary};
use kanvas_proto::codec::decode_board_message;
use kanvas_proto::event::BoardEvent;
use kanvas_proto::ids::BoardId;
use tokio::sync::mpsc;

use crate::notice::{self, Notice};
use crate::patch::{self, BoardFields, TaskFields};
use crate::store::{EntityStore, PatchOutcome};

/// Returns `board` with `event` applied.
///
/// Applying the same event twice yields the same board as applying it once.
#[must_use]
pub fn apply_event(board: &Board, event: &BoardEvent) -> Board {
    match event {
        BoardEvent::BoardUpdated(e) => patch::update_board(
            board,
            &BoardFields {
                name: e.name.clone(),
                description: e.description.clone(),
                visibility: e.visibility,
            },
        ),
        BoardEvent::MemberJoined(member) => patch::add_member(board, member),
        BoardEvent::MemberRemoved(e) => patch::remove_member(board, e.member_id),
        BoardEvent::RoleChanged(e) => patch::set_member_role(board, e.member_id, e.role),
        BoardEvent::ColumnCreated(e) => patch::insert_column(
            board,
            &Column::empty(e.column_id, e.order_index, e.name.clone()),
        ),
        BoardEvent::ColumnUpdated(e) => patch::rename_column(board, e.column_id, &e.column_name),
        BoardEvent::ColumnMoved(e) => patch::set_column_rank(board, e.column_id, e.new_order_index),
        BoardEvent::ColumnDeleted(e) => patch::remove_column(board, e.column_id),
        BoardEvent::TaskCreated(e) => patch::insert_task(
            board,
            &TaskSummary::fresh(e.task_id, e.column_id, e.order_index, e.title.clone()),
        ),
        BoardEvent::TaskUpdated(e) => patch::update_task(
            board,
            e.task_id,
            &TaskFields {
                title: e.title.clone(),
                deadline: e.deadline,
                priority: e.priority,
                status: e.task_status,
                is_expired: Some(e.is_expired),
            },
        ),
        BoardEvent::TaskMoved(e) => {
            patch::move_task(board, e.task_id, e.target_column_id, e.new_order_index)
        }
        BoardEvent::TaskDeleted(e) => patch::remove_task(board, e.task_id),
        BoardEvent::TaskAssigned(e) => patch::set_assignee(board, e.task_id, e.board_member_id, true),
        BoardEvent::TaskUnassigned(e) => {
            patch::set_assignee(board, e.task_id, e.board_member_id, false)
        }
    }
}

/// Feeds events for one board into the store.
#[derive(Debug, Clone)]
pub struct EventReconciler {
    store: EntityStore,
    board_id: BoardId,
    notices: mpsc::Sender<Notice>,
}

impl EventReconciler {
    /// Creates a reconciler for `board_id`.
    #[must_use]
    pub const fn new(store: EntityStore, board_id: BoardId, notices: mpsc::Sender<Notice>) -> Self {
        Self {
            store,
            board_id,
            notices,
        }
    }

    /// Board this reconciler patches.
    #[must_use]
    pub const fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Applies a decoded event if the store still holds this board.
    pub fn apply(&self, event: &BoardEvent) -> PatchOutcome {
        let outcome = self
            .store
            .patch_board(self.board_id, |board| apply_event(board, event));
        tracing::debug!(
            board_id = %self.board_id,
            tag = event.tag(),
            ?outcome,
            "board event reconciled"
        );
        outcome
    }

    /// Decodes and applies a raw board-topic frame.
    ///
    /// Returns `None` if the frame could not be decoded; a warning notice is
    /// emitted and the store is left untouched.
    pub fn handle_raw(&self, text: &str) -> Option<PatchOutcome> {
        match decode_board_message(text) {
            Ok(event) => Some(self.apply(&event)),
            Err(e) => {
                tracing::warn!(board_id = %self.board_id, error = %e, "dropping undecodable board message");
                notice::emit(
                    &self.notices,
                    Notice::Warning(format!("Failed to parse board message: {e}")),
                );
                None
            }
        }
    }
}
