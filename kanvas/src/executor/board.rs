//! Board settings and membership commands.

use std::sync::Arc;

use kanvas_proto::board::BoardRole;
use kanvas_proto::command::{BoardUpdateRequest, RoleChangeRequest};
use kanvas_proto::ids::MemberId;

use super::{CommandError, CommandKind, CommandPhase, OptimisticExecutor, PendingCommand, validate_name};
use crate::notice::Notice;
use crate::patch::{self, BoardFields};
use crate::remote::BoardCommands;

impl<R: BoardCommands> OptimisticExecutor<R> {
    /// Saves board settings. A new name is trimmed and validated.
    ///
    /// The settings are kept locally if the save fails.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the name is
    /// invalid.
    pub fn update_board(&self, mut update: BoardUpdateRequest) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        if let Some(name) = update.name.take() {
            update.name = Some(validate_name(
                "board name",
                &name,
                self.shared.config.max_column_name_len,
            )?);
        }
        let board_id = board.board_id;
        let fields = BoardFields {
            name: update.name.clone(),
            description: update.description.clone(),
            visibility: update.visibility,
        };
        self.shared
            .store
            .patch_board(board_id, |b| patch::update_board(b, &fields));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.update_board(board_id, update).await };
        Ok(self.dispatch(CommandKind::UpdateBoard, board_id, request, |shared, result| {
            match result {
                Ok(()) => {
                    shared.notify(Notice::Success("Board updated".to_string()));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared.fail(&e);
                    CommandPhase::Retained
                }
            }
        }))
    }

    /// Changes a member's role.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the member
    /// is unknown.
    pub fn change_member_role(
        &self,
        member_id: MemberId,
        role: BoardRole,
    ) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        if board.member(member_id).is_none() {
            return Err(CommandError::NotFound(format!("member {member_id}")));
        }
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::set_member_role(b, member_id, role));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move {
            remote
                .change_member_role(board_id, RoleChangeRequest { member_id, role })
                .await
        };
        Ok(self.dispatch(CommandKind::ChangeRole, board_id, request, |shared, result| {
            match result {
                Ok(()) => CommandPhase::Reconciled,
                Err(e) => {
                    shared.fail(&e);
                    CommandPhase::Retained
                }
            }
        }))
    }

    /// Removes a member from the board, restoring them in place on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the member
    /// is unknown.
    pub fn remove_member(&self, member_id: MemberId) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let index = board
            .board_members
            .iter()
            .position(|m| m.member_id == member_id)
            .ok_or_else(|| CommandError::NotFound(format!("member {member_id}")))?;
        let snapshot = board.board_members[index].clone();
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::remove_member(b, member_id));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.remove_member(board_id, member_id).await };
        Ok(self.dispatch(CommandKind::RemoveMember, board_id, request, move |shared, result| {
            match result {
                Ok(()) => {
                    shared.notify(Notice::Success(format!(
                        "User {} has been removed from the board",
                        snapshot.username
                    )));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::restore_member(b, &snapshot, index));
                    shared.fail(&e);
                    CommandPhase::RolledBack
                }
            }
        }))
    }
}
