//! Task commands and the open task detail.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use kanvas_proto::board::{Board, TaskDetail, TaskSummary};
use kanvas_proto::command::{AssignmentRequest, MoveTaskRequest, TaskRequest, TaskUpdateRequest};
use kanvas_proto::ids::{ColumnId, MemberId, TaskId};

use super::column::confirmed_column;
use super::{CommandError, CommandKind, CommandPhase, OptimisticExecutor, PendingCommand, validate_name};
use crate::notice::Notice;
use crate::ordering::{MovePlan, rank_after_last, rank_between};
use crate::patch::{self, TaskFields};
use crate::remote::{BoardCommands, RemoteError};

fn confirmed_task(board: &Board, task_id: TaskId) -> Result<&TaskSummary, CommandError> {
    board
        .find_task(task_id)
        .filter(|t| !t.task_id.is_temporary())
        .ok_or_else(|| CommandError::NotFound(format!("task {task_id}")))
}

fn apply_update_to_detail(detail: &mut TaskDetail, update: &TaskUpdateRequest) {
    if detail.task_id != update.task_id {
        return;
    }
    if let Some(title) = &update.title {
        detail.title.clone_from(title);
    }
    if let Some(description) = &update.description {
        detail.description = Some(description.clone());
    }
    if let Some(deadline) = update.deadline {
        detail.deadline = Some(deadline);
    }
    if let Some(priority) = update.priority {
        detail.priority = Some(priority);
    }
    if let Some(status) = update.status {
        detail.status = status;
    }
}

impl<R: BoardCommands> OptimisticExecutor<R> {
    /// Appends a task titled `title` (trimmed) to a column.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded, the column is
    /// unknown, or the title is invalid.
    pub fn create_task(&self, column_id: ColumnId, title: &str) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let title = validate_name("task title", title, self.shared.config.max_task_title_len)?;
        let column = confirmed_column(&board, column_id)?;
        let board_id = board.board_id;
        let temporary = TaskId::new(self.next_temporary());
        let rank = rank_after_last(&column.tasks, self.shared.config.rank_step);
        let task = TaskSummary::fresh(temporary, column_id, rank, title.clone());
        self.shared
            .store
            .patch_board(board_id, |b| patch::insert_task(b, &task));

        let remote = Arc::clone(&self.shared.remote);
        let request =
            async move { remote.create_task(board_id, TaskRequest { column_id, title }).await };
        Ok(self.dispatch(CommandKind::CreateTask, board_id, request, move |shared, result| {
            match result {
                Ok(created) => {
                    shared.store.patch_board(board_id, |b| {
                        patch::confirm_task(
                            b,
                            temporary,
                            created.task_id,
                            created.order_index,
                            created.is_expired,
                        )
                    });
                    shared.notify(Notice::Success("Task created".to_string()));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::remove_task(b, temporary));
                    shared.fail(&e);
                    CommandPhase::RolledBack
                }
            }
        }))
    }

    /// Edits task fields. `None` fields are left unchanged; an update with no
    /// fields returns `Ok(None)` without a request.
    ///
    /// The edit lands on the cached summary and, when it is the same task, on
    /// the open detail. On success both are overwritten with the stored task.
    /// On failure the edit stays and an error notice is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded, the task is
    /// unknown, or a new title is invalid.
    pub fn update_task(
        &self,
        mut update: TaskUpdateRequest,
    ) -> Result<Option<PendingCommand>, CommandError> {
        let board = self.writable_board()?;
        let task_id = confirmed_task(&board, update.task_id)?.task_id;
        if let Some(title) = update.title.take() {
            update.title = Some(validate_name(
                "task title",
                &title,
                self.shared.config.max_task_title_len,
            )?);
        }
        if update.is_empty() {
            return Ok(None);
        }
        let board_id = board.board_id;
        let fields = TaskFields {
            title: update.title.clone(),
            deadline: update.deadline,
            priority: update.priority,
            status: update.status,
            is_expired: None,
        };
        self.shared
            .store
            .patch_board(board_id, |b| patch::update_task(b, task_id, &fields));
        self.shared.with_detail(|d| apply_update_to_detail(d, &update));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.update_task(board_id, update).await };
        Ok(Some(self.dispatch(
            CommandKind::UpdateTask,
            board_id,
            request,
            move |shared, result| match result {
                Ok(stored) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::sync_task_from_detail(b, &stored));
                    shared.with_detail(|d| {
                        if d.task_id == stored.task_id {
                            *d = stored;
                        }
                    });
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared.fail(&e);
                    CommandPhase::Retained
                }
            },
        )))
    }

    /// Moves a task into `target` between the neighbors named in `plan`.
    ///
    /// Same-column and cross-column moves share this path. The task snaps to
    /// a provisional rank at once; the authoritative placement overwrites it
    /// on success. Failure leaves the provisional placement.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the task or
    /// target column is unknown.
    pub fn reorder_task(
        &self,
        plan: &MovePlan<TaskId>,
        target: ColumnId,
    ) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let task_id = confirmed_task(&board, plan.item)?.task_id;
        let column = confirmed_column(&board, target)?;
        let rank_of = |id: Option<TaskId>| id.and_then(|id| column.task(id)).map(|t| t.order_index);
        let provisional = rank_between(
            rank_of(plan.preceding),
            rank_of(plan.following),
            self.shared.config.rank_step,
        );
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::move_task(b, task_id, target, provisional));

        let request = MoveTaskRequest {
            target_column_id: target,
            task_id,
            preceding_task_id: plan.anchor_before,
            following_task_id: plan.anchor_after,
        };
        let remote = Arc::clone(&self.shared.remote);
        let call = async move { remote.move_task(board_id, request).await };
        Ok(self.dispatch(CommandKind::MoveTask, board_id, call, move |shared, result| {
            match result {
                Ok(moved) => {
                    shared.store.patch_board(board_id, |b| {
                        patch::move_task(b, moved.task_id, moved.column_id, moved.order_index)
                    });
                    shared.with_detail(|d| {
                        if d.task_id == moved.task_id {
                            d.column_id = moved.column_id;
                            d.order_index = moved.order_index;
                        }
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

    /// Deletes a task, restoring it on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the task is
    /// unknown.
    pub fn delete_task(&self, task_id: TaskId) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let snapshot = confirmed_task(&board, task_id)?.clone();
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::remove_task(b, task_id));

        let remote = Arc::clone(&self.shared.remote);
        let request = async move { remote.delete_task(board_id, task_id).await };
        Ok(self.dispatch(CommandKind::DeleteTask, board_id, request, move |shared, result| {
            match result {
                Ok(()) => {
                    let mut detail = shared.detail.lock();
                    if detail.as_ref().is_some_and(|d| d.task_id == task_id) {
                        *detail = None;
                    }
                    drop(detail);
                    shared.notify(Notice::Success("Task deleted".to_string()));
                    CommandPhase::Reconciled
                }
                Err(e) => {
                    shared
                        .store
                        .patch_board(board_id, |b| patch::insert_task(b, &snapshot));
                    shared.fail(&e);
                    CommandPhase::RolledBack
                }
            }
        }))
    }

    /// Assigns a board member to a task.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the task or
    /// member is unknown.
    pub fn assign_task(
        &self,
        task_id: TaskId,
        member_id: MemberId,
    ) -> Result<PendingCommand, CommandError> {
        self.set_assignment(task_id, member_id, true)
    }

    /// Removes a board member from a task's assignees.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no writable board is loaded or the task or
    /// member is unknown.
    pub fn unassign_task(
        &self,
        task_id: TaskId,
        member_id: MemberId,
    ) -> Result<PendingCommand, CommandError> {
        self.set_assignment(task_id, member_id, false)
    }

    fn set_assignment(
        &self,
        task_id: TaskId,
        member_id: MemberId,
        assigned: bool,
    ) -> Result<PendingCommand, CommandError> {
        let board = self.writable_board()?;
        let task_id = confirmed_task(&board, task_id)?.task_id;
        let member = board
            .member(member_id)
            .ok_or_else(|| CommandError::NotFound(format!("member {member_id}")))?;
        let request = AssignmentRequest {
            task_id,
            member_id,
            user_id: member.user_id,
            assigner_id: self.shared.viewer,
            board_name: board.name.clone(),
        };
        let board_id = board.board_id;
        self.shared
            .store
            .patch_board(board_id, |b| patch::set_assignee(b, task_id, member_id, assigned));
        self.shared.with_detail(|d| {
            if d.task_id == task_id {
                patch::toggle(&mut d.assignee_ids, member_id, assigned);
            }
        });

        let remote = Arc::clone(&self.shared.remote);
        let (kind, call) = if assigned {
            let call = async move { remote.assign_task(board_id, request).await }.boxed();
            (CommandKind::AssignTask, call)
        } else {
            let call = async move { remote.unassign_task(board_id, request).await }.boxed();
            (CommandKind::UnassignTask, call)
        };
        Ok(self.dispatch(kind, board_id, call, |shared, result| match result {
            Ok(()) => CommandPhase::Reconciled,
            Err(e) => {
                shared.fail(&e);
                CommandPhase::Retained
            }
        }))
    }

    /// Fetches a task's detail and makes it the open detail.
    ///
    /// The fetched fields are also pushed into the cached summary. A fetch
    /// that completes after the board was closed is returned but not stored.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if no board is loaded or the task is unknown.
    /// The returned future fails with [`RemoteError`] if the fetch fails.
    pub fn open_task(
        &self,
        task_id: TaskId,
    ) -> Result<BoxFuture<'static, Result<TaskDetail, RemoteError>>, CommandError> {
        let board = self.readable_board()?;
        let task_id = confirmed_task(&board, task_id)?.task_id;
        let board_id = board.board_id;
        let shared = Arc::clone(&self.shared);
        Ok(async move {
            let detail = match shared.remote.get_task(board_id, task_id).await {
                Ok(detail) => detail,
                Err(e) => {
                    if shared.store.active_board_id() == Some(board_id) {
                        shared.fail(&e);
                    }
                    return Err(e);
                }
            };
            if shared.store.active_board_id() == Some(board_id) {
                shared
                    .store
                    .patch_board(board_id, |b| patch::sync_task_from_detail(b, &detail));
                *shared.detail.lock() = Some(detail.clone());
            }
            Ok(detail)
        }
        .boxed())
    }

    /// Closes the open task detail.
    pub fn close_task(&self) {
        *self.shared.detail.lock() = None;
    }
}
