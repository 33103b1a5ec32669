//! Named pure board transformations.
//!
//! Each function takes the current board and returns a new one; none of them
//! mutate their input. The executor (optimistic apply, reconcile, rollback)
//! and the event reconciler share these, so an optimistic edit and the event
//! echoing it converge on the same board. Every function is idempotent and
//! treats a missing target as a no-op.

use chrono::{DateTime, Utc};
use kanvas_proto::board::{
    Board, BoardRole, Column, Member, Priority, TaskDetail, TaskStatus, TaskSummary, Visibility,
};
use kanvas_proto::ids::{ColumnId, MemberId, Rank, TaskId};

use crate::ordering::sort_by_rank;

/// Field values to overwrite on a task. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    /// New title.
    pub title: Option<String>,
    /// New deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New lifecycle status.
    pub status: Option<TaskStatus>,
    /// Server-derived expiry flag.
    pub is_expired: Option<bool>,
}

/// Board settings to overwrite. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFields {
    /// New board name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New visibility.
    pub visibility: Option<Visibility>,
}

// --- board and members ---

/// Overwrites the given board settings.
#[must_use]
pub fn update_board(board: &Board, fields: &BoardFields) -> Board {
    let mut next = board.clone();
    if let Some(name) = &fields.name {
        next.name.clone_from(name);
    }
    if let Some(description) = &fields.description {
        next.description = Some(description.clone());
    }
    if let Some(visibility) = fields.visibility {
        next.visibility = visibility;
    }
    next
}

/// Appends a member unless one with the same identifier exists.
#[must_use]
pub fn add_member(board: &Board, member: &Member) -> Board {
    let mut next = board.clone();
    if board.member(member.member_id).is_none() {
        next.board_members.push(member.clone());
    }
    next
}

/// Removes a member by identifier.
#[must_use]
pub fn remove_member(board: &Board, member_id: MemberId) -> Board {
    let mut next = board.clone();
    next.board_members.retain(|m| m.member_id != member_id);
    next
}

/// Overwrites a member's role.
#[must_use]
pub fn set_member_role(board: &Board, member_id: MemberId, role: BoardRole) -> Board {
    let mut next = board.clone();
    if let Some(m) = next.board_members.iter_mut().find(|m| m.member_id == member_id) {
        m.board_role = role;
    }
    next
}

/// Puts a previously removed member back, keeping its former position when
/// possible.
#[must_use]
pub fn restore_member(board: &Board, member: &Member, index: usize) -> Board {
    let mut next = board.clone();
    if board.member(member.member_id).is_none() {
        let index = index.min(next.board_members.len());
        next.board_members.insert(index, member.clone());
    }
    next
}

// --- columns ---

/// Adds a column unless its identifier is present, then re-sorts.
#[must_use]
pub fn insert_column(board: &Board, column: &Column) -> Board {
    let mut next = board.clone();
    if board.column(column.column_id).is_none() {
        next.columns.push(column.clone());
        sort_by_rank(&mut next.columns);
    }
    next
}

/// Removes a column together with its tasks.
#[must_use]
pub fn remove_column(board: &Board, column_id: ColumnId) -> Board {
    let mut next = board.clone();
    next.columns.retain(|c| c.column_id != column_id);
    next
}

/// Overwrites a column's name.
#[must_use]
pub fn rename_column(board: &Board, column_id: ColumnId, name: &str) -> Board {
    let mut next = board.clone();
    if let Some(c) = next.columns.iter_mut().find(|c| c.column_id == column_id) {
        c.name = name.to_string();
    }
    next
}

/// Overwrites a column's rank, then re-sorts.
#[must_use]
pub fn set_column_rank(board: &Board, column_id: ColumnId, rank: Rank) -> Board {
    let mut next = board.clone();
    if let Some(c) = next.columns.iter_mut().find(|c| c.column_id == column_id) {
        c.order_index = rank;
        sort_by_rank(&mut next.columns);
    }
    next
}

/// Swaps an optimistic column for its confirmed identity.
///
/// If the confirmed identifier is already present (an event beat the
/// response), the temporary column is dropped instead. Tasks created under
/// the temporary column move along with it.
#[must_use]
pub fn confirm_column(
    board: &Board,
    temporary: ColumnId,
    column_id: ColumnId,
    name: &str,
    rank: Rank,
) -> Board {
    if board.column(column_id).is_some() {
        return remove_column(board, temporary);
    }
    let mut next = board.clone();
    if let Some(c) = next.columns.iter_mut().find(|c| c.column_id == temporary) {
        c.column_id = column_id;
        c.name = name.to_string();
        c.order_index = rank;
        for t in &mut c.tasks {
            t.column_id = column_id;
        }
        sort_by_rank(&mut next.columns);
    }
    next
}

// --- tasks ---

/// Adds a task to its column unless its identifier is present anywhere on
/// the board, then re-sorts the column.
#[must_use]
pub fn insert_task(board: &Board, task: &TaskSummary) -> Board {
    let mut next = board.clone();
    if board.find_task(task.task_id).is_some() {
        return next;
    }
    if let Some(c) = next.columns.iter_mut().find(|c| c.column_id == task.column_id) {
        c.tasks.push(task.clone());
        sort_by_rank(&mut c.tasks);
    }
    next
}

/// Removes a task from whichever column holds it.
#[must_use]
pub fn remove_task(board: &Board, task_id: TaskId) -> Board {
    let mut next = board.clone();
    for c in &mut next.columns {
        c.tasks.retain(|t| t.task_id != task_id);
    }
    next
}

/// Places a task in `column_id` with `rank`, removing it from its current
/// column. A missing task or destination column leaves the board as is.
#[must_use]
pub fn move_task(board: &Board, task_id: TaskId, column_id: ColumnId, rank: Rank) -> Board {
    let Some(task) = board.find_task(task_id) else {
        return board.clone();
    };
    if board.column(column_id).is_none() {
        return board.clone();
    }
    let moved = TaskSummary {
        column_id,
        order_index: rank,
        ..task.clone()
    };
    let mut next = remove_task(board, task_id);
    if let Some(c) = next.columns.iter_mut().find(|c| c.column_id == column_id) {
        c.tasks.push(moved);
        sort_by_rank(&mut c.tasks);
    }
    next
}

/// Swaps an optimistic task for its confirmed identity, or drops it when
/// the confirmed identifier is already present.
#[must_use]
pub fn confirm_task(
    board: &Board,
    temporary: TaskId,
    task_id: TaskId,
    rank: Rank,
    is_expired: bool,
) -> Board {
    if board.find_task(task_id).is_some() {
        return remove_task(board, temporary);
    }
    let mut next = board.clone();
    for c in &mut next.columns {
        if let Some(t) = c.tasks.iter_mut().find(|t| t.task_id == temporary) {
            t.task_id = task_id;
            t.order_index = rank;
            t.is_expired = is_expired;
            sort_by_rank(&mut c.tasks);
            break;
        }
    }
    next
}

/// Overwrites the given task fields.
#[must_use]
pub fn update_task(board: &Board, task_id: TaskId, fields: &TaskFields) -> Board {
    let mut next = board.clone();
    if let Some(t) = next
        .columns
        .iter_mut()
        .flat_map(|c| c.tasks.iter_mut())
        .find(|t| t.task_id == task_id)
    {
        apply_task_fields(t, fields);
    }
    next
}

/// Overwrites a summary's display fields from a fetched detail. Placement
/// (column and rank) is left alone.
#[must_use]
pub fn sync_task_from_detail(board: &Board, detail: &TaskDetail) -> Board {
    let mut next = board.clone();
    if let Some(t) = next
        .columns
        .iter_mut()
        .flat_map(|c| c.tasks.iter_mut())
        .find(|t| t.task_id == detail.task_id)
    {
        t.title.clone_from(&detail.title);
        t.deadline = detail.deadline;
        t.priority = detail.priority;
        t.status = detail.status;
        t.is_expired = detail.is_expired;
        t.assignee_ids.clone_from(&detail.assignee_ids);
    }
    next
}

/// Adds or removes a member in a task's assignee list.
#[must_use]
pub fn set_assignee(board: &Board, task_id: TaskId, member_id: MemberId, assigned: bool) -> Board {
    let mut next = board.clone();
    if let Some(t) = next
        .columns
        .iter_mut()
        .flat_map(|c| c.tasks.iter_mut())
        .find(|t| t.task_id == task_id)
    {
        toggle(&mut t.assignee_ids, member_id, assigned);
    }
    next
}

/// Overwrites fields on a single summary in place.
pub fn apply_task_fields(task: &mut TaskSummary, fields: &TaskFields) {
    if let Some(title) = &fields.title {
        task.title.clone_from(title);
    }
    if let Some(deadline) = fields.deadline {
        task.deadline = Some(deadline);
    }
    if let Some(priority) = fields.priority {
        task.priority = Some(priority);
    }
    if let Some(status) = fields.status {
        task.status = status;
    }
    if let Some(is_expired) = fields.is_expired {
        task.is_expired = is_expired;
    }
}

/// Adds `member_id` to `ids` if `assigned` and absent, removes it otherwise.
pub fn toggle(ids: &mut Vec<MemberId>, member_id: MemberId, assigned: bool) {
    if assigned {
        if !ids.contains(&member_id) {
            ids.push(member_id);
        }
    } else {
        ids.retain(|id| *id != member_id);
    }
}
