//! Column commands.

use std::sync::Arc;

use kanvas_proto::board::{Board, Column};
use kanvas_proto::command::{ColumnRequest, MoveColumnRequest};
use kanvas_proto::ids::ColumnId;

use super::{CommandError, CommandKind, CommandPhase, OptimisticExecutor, PendingCommand, validate_name};
use crate::notice::Notice;
use crate::ordering::{MovePlan, rank_after_last, rank_between};
use crate::patch;
use crate::remote::BoardCommands;

/// Looks up a column the authority knows about.
pub(super) fn confirmed_column(board: &Board, column_id: ColumnId) -> Result<&Column, CommandError> {
    board
        .column(column_id)
        .filter(|c| !c.column_id.is_temporary())
        .ok_or_else(|| CommandError::NotFound(format!("column {column_id}")))
}

impl<R: BoardCommands> OptimisticExecutor<R> {
    /// Appends a column named `name` (trimmed).
    ///
    /// The column appears immediately under a temporary identifier after the
    /// last column and is swapped for the confirmed one on success, or
    /// removed on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the name is
    /// invalid.
    pub fn create_column(&self, name: &str) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let name = validate_name("column name", name, self.shared.config.max_column_name_len)?;
        let board_id = board.board_id;
        let temporary = ColumnId::new(self.next_temporary());
        let rank = rank_after_last(&board.columns, self.shared.config.rank_step);
        let column = Column::empty(temporary, rank, name.clone());
        self.shared
            .store
            .patch_board(board_id, |b| patch::insert_column(b, &column));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.create_column(board_id, ColumnRequest { name }).await };
        Ok(self.dispatch(CommandKind::CreateColumn, board_id, request, move |shared, result| {
            match result {
                Ok(created) => {
                    shared.store.patch_board(board_id, |b| {
                        patch::confirm_column(
                            b,
                            temporary,
                            created.column_id,
                            &created.name,
                            created.order_index,
                        )
                    });
                    shared.notify(Notice::Success(format!("Column \"{}\" created!", created.name)));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::remove_column(b, temporary));
                    shared.fail(&e);
                    CommandPhase::RolledBack
                }
            }
        }))
    }

    /// Renames a column. Returns `Ok(None)` when the trimmed name equals the
    /// current one; no request is issued then.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded, the column is
    /// unknown, or the name is invalid.
    pub fn rename_column(
        &self,
        column_id: ColumnId,
        name: &str,
    ) -> Result<Option<PendingCommand>, CommandError> {
        let board = self.writable_board()?;
        let name = validate_name("column name", name, self.shared.config.max_column_name_len)?;
        let column = confirmed_column(&board, column_id)?;
        if column.name == name {
            return Ok(None);
        }
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::rename_column(b, column_id, &name));

        let remote = Arc::clone(&self.shared.remote);
        let request =
            async move { remote.rename_column(board_id, column_id, ColumnRequest { name }).await };
        Ok(Some(self.dispatch(
            CommandKind::RenameColumn,
            board_id,
            request,
            |shared, result| match result {
                Ok(()) => CommandPhase::Reconciled,
                Err(e) => {
                    shared.fail(&e);
                    CommandPhase::Retained
                }
            },
        )))
    }

    /// Deletes a column and its tasks, restoring both on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the column
    /// is unknown.
    pub fn delete_column(&self, column_id: ColumnId) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let snapshot = confirmed_column(&board, column_id)?.clone();
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::remove_column(b, column_id));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.delete_column(board_id, column_id).await };
        Ok(self.dispatch(CommandKind::DeleteColumn, board_id, request, move |shared, result| {
            match result {
                Ok(()) => {
                    shared.notify(Notice::Success("Column deleted".to_string()));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::insert_column(b, &snapshot));
                    shared.fail(&e);
                    CommandPhase::RolledBack
                }
            }
        }))
    }

    /// Moves a column between the neighbors named in `plan`.
    ///
    /// A provisional rank from the neighbor rule keeps the board sorted until
    /// the authoritative rank arrives. Failure leaves the provisional order.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the column
    /// is unknown.
    pub fn reorder_column(&self, plan: &MovePlan<ColumnId>) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let column_id = confirmed_column(&board, plan.item)?.column_id;
        let rank_of = |id: Option<ColumnId>| id.and_then(|id| board.column(id)).map(|c| c.order_index);
        let provisional = rank_between(
            rank_of(plan.preceding),
            rank_of(plan.following),
            self.shared.config.rank_step,
        );
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::set_column_rank(b, column_id, provisional));

        let request = MoveColumnRequest {
            column_id,
            preceding_column_id: plan.anchor_before,
            following_column_id: plan.anchor_after,
        };
        let remote = Arc::clone(&self.shared.remote);
        let call = async move { remote.move_column(board_id, request).await };
        Ok(self.dispatch(CommandKind::MoveColumn, board_id, call, move |shared, result| {
            match result {
                Ok(moved) => {
                    shared.store.patch_board(board_id, |b| {
                        patch::set_column_rank(b, moved.column_id, moved.order_index)
                    });
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared.fail(&e);
                    CommandPhase::Retained
                }
            }
        }))
    }
}
