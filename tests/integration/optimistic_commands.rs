//! Integration tests for the optimistic command executor.
//!
//! Covers the two-phase lifecycle of each command family against an
//! `InMemoryBoardService`: the optimistic patch, reconciliation with the
//! response, rollback or retention on failure, the stale-result guard, and
//! deduplication when the real-time echo beats the response.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use kanvas::executor::{
    CommandError, CommandKind, CommandPhase, ExecutorConfig, OptimisticExecutor, ValidationError,
};
use kanvas::notice::{GENERIC_FAILURE, Notice};
use kanvas::reconcile::EventReconciler;
use kanvas::remote::RemoteError;
use kanvas::remote::memory::InMemoryBoardService;
use kanvas::store::EntityStore;
use kanvas::transport::{EventSource, Topic};
use kanvas_proto::board::{Board, BoardRole, Column, Member, Priority, TaskStatus, TaskSummary, Visibility};
use kanvas_proto::command::{BoardUpdateRequest, TaskUpdateRequest};
use kanvas_proto::ids::{BoardId, ColumnId, MemberId, Rank, TaskId, UserId};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BOARD: BoardId = BoardId::new(1);
const TODO: ColumnId = ColumnId::new(1);
const TASK: TaskId = TaskId::new(5);
const VIEWER: UserId = UserId::new(100);

fn member(id: i64, username: &str) -> Member {
    Member {
        member_id: MemberId::new(id),
        user_id: UserId::new(100 + id),
        firstname: username.to_string(),
        lastname: "Tester".to_string(),
        username: username.to_string(),
        avatar_color: "#336699".to_string(),
        board_role: BoardRole::Editor,
        joined_at: None,
    }
}

/// One column "Todo" at 1000 holding task 5, and two members.
fn board() -> Board {
    let mut todo = Column::empty(TODO, Rank::new(1000.0), "Todo".to_string());
    todo.tasks = vec![TaskSummary::fresh(TASK, TODO, Rank::new(1000.0), "Write tests".to_string())];
    Board {
        board_id: BOARD,
        name: "Sprint".to_string(),
        description: Some("current sprint".to_string()),
        created_at: None,
        visibility: Visibility::Private,
        board_role: BoardRole::Admin,
        readonly: false,
        board_members: vec![member(1, "ada"), member(2, "linus")],
        columns: vec![todo],
    }
}

struct Harness {
    store: EntityStore,
    service: Arc<InMemoryBoardService>,
    executor: OptimisticExecutor<InMemoryBoardService>,
    notices: mpsc::Receiver<Notice>,
}

fn harness_with(board: Board) -> Harness {
    let store = EntityStore::new();
    store.replace(board.clone());
    let service = Arc::new(InMemoryBoardService::new(board));
    let (executor, notices) = OptimisticExecutor::new(
        store.clone(),
        Arc::clone(&service),
        VIEWER,
        ExecutorConfig::default(),
        16,
    );
    Harness {
        store,
        service,
        executor,
        notices,
    }
}

fn harness() -> Harness {
    harness_with(board())
}

fn current(store: &EntityStore) -> Arc<Board> {
    store.read().expect("board loaded")
}

/// Yields until the service has received `count` calls.
async fn wait_for_calls(service: &InMemoryBoardService, count: usize) {
    while service.calls().len() < count {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_column_swaps_temporary_for_confirmed() {
    let mut h = harness_with({
        let mut b = board();
        b.columns[0].tasks.clear();
        b
    });

    let pending = h.executor.create_column("  Done ").unwrap();
    assert_eq!(pending.kind(), CommandKind::CreateColumn);

    // Optimistic column: temporary id, appended after the last column.
    let optimistic = current(&h.store);
    assert_eq!(optimistic.columns.len(), 2);
    let temporary = &optimistic.columns[1];
    assert!(temporary.column_id.is_temporary());
    assert_eq!(temporary.name, "Done");
    assert_eq!(temporary.order_index, Rank::new(2000.0));
    assert_eq!(h.executor.in_flight(), 1);

    let id = pending.id();
    let outcome = pending.await;
    assert_eq!(outcome.phase, CommandPhase::Reconciled);
    assert_eq!(h.executor.phase(id), Some(CommandPhase::Reconciled));
    assert_eq!(h.executor.in_flight(), 0);

    let board = current(&h.store);
    let ids: Vec<_> = board.columns.iter().map(|c| c.column_id).collect();
    assert_eq!(ids, vec![TODO, ColumnId::new(2)]);
    let done = board.column(ColumnId::new(2)).unwrap();
    assert_eq!(done.name, "Done");
    assert_eq!(done.order_index, Rank::new(2000.0));
    assert!(done.tasks.is_empty());

    assert_eq!(
        h.notices.try_recv().unwrap(),
        Notice::Success("Column \"Done\" created!".to_string())
    );
}

#[tokio::test]
async fn create_column_rolls_back_on_failure() {
    let mut h = harness();
    let before = current(&h.store);
    h.service.fail_next(RemoteError::Network("connection reset".to_string()));

    let outcome = h.executor.create_column("Done").unwrap().await;

    assert_eq!(outcome.phase, CommandPhase::RolledBack);
    assert_eq!(*current(&h.store), *before);
    assert_eq!(h.notices.try_recv().unwrap(), Notice::Error(GENERIC_FAILURE.to_string()));
}

#[tokio::test]
async fn delete_column_restores_column_and_tasks_on_failure() {
    let mut h = harness();
    h.service.fail_next(RemoteError::Rejected {
        status: 403,
        message: "Only admins can delete columns".to_string(),
    });

    let pending = h.executor.delete_column(TODO).unwrap();
    assert!(current(&h.store).columns.is_empty());

    let outcome = pending.await;
    assert_eq!(outcome.phase, CommandPhase::RolledBack);
    let board = current(&h.store);
    let todo = board.column(TODO).unwrap();
    assert_eq!(todo.tasks.len(), 1);
    assert_eq!(todo.tasks[0].task_id, TASK);
    assert_eq!(
        h.notices.try_recv().unwrap(),
        Notice::Error("Only admins can delete columns".to_string())
    );
}

#[tokio::test]
async fn rename_column_keeps_new_name_on_failure() {
    let mut h = harness();
    h.service.fail_next(RemoteError::Network("timeout".to_string()));

    let outcome = h.executor.rename_column(TODO, "Backlog").unwrap().unwrap().await;

    assert_eq!(outcome.phase, CommandPhase::Retained);
    assert_eq!(current(&h.store).column(TODO).unwrap().name, "Backlog");
    assert_eq!(h.service.board_snapshot().column(TODO).unwrap().name, "Todo");
    assert!(matches!(h.notices.try_recv().unwrap(), Notice::Error(_)));
}

#[tokio::test]
async fn rename_to_same_name_is_skipped() {
    let h = harness();
    assert!(h.executor.rename_column(TODO, " Todo ").unwrap().is_none());
    assert!(h.service.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Synchronous refusals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_names_are_refused_before_any_patch() {
    let h = harness();
    let version = h.store.version();

    assert_eq!(
        h.executor.create_column("   ").unwrap_err(),
        CommandError::Validation(ValidationError::Empty {
            field: "column name"
        })
    );
    assert_eq!(
        h.executor.create_task(TODO, &"x".repeat(256)).unwrap_err(),
        CommandError::Validation(ValidationError::TooLong {
            field: "task title",
            max: 255
        })
    );
    assert_eq!(h.store.version(), version);
    assert!(h.service.calls().is_empty());
}

#[tokio::test]
async fn read_only_board_refuses_writes() {
    let mut readonly = board();
    readonly.readonly = true;
    let h = harness_with(readonly);

    assert_eq!(h.executor.create_column("Done").unwrap_err(), CommandError::ReadOnly);
    assert_eq!(h.executor.delete_task(TASK).unwrap_err(), CommandError::ReadOnly);
    assert!(h.service.calls().is_empty());
}

#[tokio::test]
async fn commands_without_board_are_refused() {
    let h = harness();
    h.store.clear();
    assert_eq!(h.executor.create_column("Done").unwrap_err(), CommandError::NoActiveBoard);
}

#[tokio::test]
async fn unknown_entities_are_not_found() {
    let h = harness();
    assert!(matches!(
        h.executor.delete_column(ColumnId::new(99)),
        Err(CommandError::NotFound(_))
    ));
    assert!(matches!(
        h.executor.assign_task(TASK, MemberId::new(99)),
        Err(CommandError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_task_echo_before_response_leaves_one_task() {
    let h = harness();
    let source = h.service.subscribe(16);
    source.subscribe(Topic::Board(BOARD));
    let (tx, _warnings) = mpsc::channel(4);
    let reconciler = EventReconciler::new(h.store.clone(), BOARD, tx);

    h.service.pause();
    let handle = h.executor.create_task(TODO, "Ship it").unwrap().spawn();
    wait_for_calls(&h.service, 1).await;

    // The TASK_CREATED echo is applied while the response is still held.
    let frame = source.recv().await.unwrap();
    reconciler.handle_raw(&frame.body);
    assert_eq!(current(&h.store).column(TODO).unwrap().tasks.len(), 3);

    h.service.resume();
    let outcome = handle.await.unwrap();
    assert_eq!(outcome.phase, CommandPhase::Reconciled);

    let board = current(&h.store);
    let tasks = &board.column(TODO).unwrap().tasks;
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| !t.task_id.is_temporary()));
    assert_eq!(tasks[1].title, "Ship it");
    assert_eq!(tasks[1].order_index, Rank::new(2000.0));
}

#[tokio::test]
async fn delete_task_rolls_back_on_failure() {
    let h = harness();
    h.service.fail_next(RemoteError::Network("offline".to_string()));

    let pending = h.executor.delete_task(TASK).unwrap();
    assert!(current(&h.store).find_task(TASK).is_none());

    assert_eq!(pending.await.phase, CommandPhase::RolledBack);
    assert!(current(&h.store).find_task(TASK).is_some());
}

#[tokio::test]
async fn update_task_reconciles_summary_and_open_detail() {
    let h = harness();
    let detail = h.executor.open_task(TASK).unwrap().await.unwrap();
    assert_eq!(detail.title, "Write tests");
    assert_eq!(h.executor.open_detail().unwrap().task_id, TASK);

    let mut update = TaskUpdateRequest::for_task(TASK);
    update.priority = Some(Priority::High);
    update.status = Some(TaskStatus::Done);
    update.description = Some("cover the executor".to_string());
    let outcome = h.executor.update_task(update).unwrap().unwrap().await;

    assert_eq!(outcome.phase, CommandPhase::Reconciled);
    let board = current(&h.store);
    let summary = board.find_task(TASK).unwrap();
    assert_eq!(summary.priority, Some(Priority::High));
    assert_eq!(summary.status, TaskStatus::Done);
    let open = h.executor.open_detail().unwrap();
    assert_eq!(open.description.as_deref(), Some("cover the executor"));
    assert_eq!(open.priority, Some(Priority::High));

    h.executor.close_task();
    assert!(h.executor.open_detail().is_none());
}

#[tokio::test]
async fn empty_task_update_is_skipped() {
    let h = harness();
    assert!(h.executor.update_task(TaskUpdateRequest::for_task(TASK)).unwrap().is_none());
    assert!(h.service.calls().is_empty());
}

#[tokio::test]
async fn assignment_is_kept_when_request_fails() {
    let h = harness();
    h.service.fail_next(RemoteError::Network("offline".to_string()));

    let outcome = h.executor.assign_task(TASK, MemberId::new(2)).unwrap().await;

    assert_eq!(outcome.kind, CommandKind::AssignTask);
    assert_eq!(outcome.phase, CommandPhase::Retained);
    let board = current(&h.store);
    assert_eq!(board.find_task(TASK).unwrap().assignee_ids, vec![MemberId::new(2)]);
}

#[tokio::test]
async fn assign_then_unassign() {
    let h = harness();
    h.executor.assign_task(TASK, MemberId::new(1)).unwrap().await;
    assert_eq!(
        h.service.board_snapshot().find_task(TASK).unwrap().assignee_ids,
        vec![MemberId::new(1)]
    );

    let outcome = h.executor.unassign_task(TASK, MemberId::new(1)).unwrap().await;
    assert_eq!(outcome.phase, CommandPhase::Reconciled);
    assert!(current(&h.store).find_task(TASK).unwrap().assignee_ids.is_empty());
    assert!(h.service.board_snapshot().find_task(TASK).unwrap().assignee_ids.is_empty());
}

// ---------------------------------------------------------------------------
// Board settings and membership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_board_applies_given_fields_only() {
    let mut h = harness();
    let outcome = h
        .executor
        .update_board(BoardUpdateRequest {
            name: Some(" Release ".to_string()),
            ..BoardUpdateRequest::default()
        })
        .unwrap()
        .await;

    assert_eq!(outcome.phase, CommandPhase::Reconciled);
    let board = current(&h.store);
    assert_eq!(board.name, "Release");
    assert_eq!(board.description.as_deref(), Some("current sprint"));
    assert_eq!(h.notices.try_recv().unwrap(), Notice::Success("Board updated".to_string()));
}

#[tokio::test]
async fn change_role_is_retained_on_failure() {
    let h = harness();
    h.service.fail_next(RemoteError::Network("offline".to_string()));

    let outcome = h
        .executor
        .change_member_role(MemberId::new(2), BoardRole::Viewer)
        .unwrap()
        .await;

    assert_eq!(outcome.phase, CommandPhase::Retained);
    let board = current(&h.store);
    assert_eq!(board.member(MemberId::new(2)).unwrap().board_role, BoardRole::Viewer);
}

#[tokio::test]
async fn remove_member_restores_position_on_failure() {
    let h = harness();
    h.service.fail_next(RemoteError::Network("offline".to_string()));

    let pending = h.executor.remove_member(MemberId::new(1)).unwrap();
    assert_eq!(current(&h.store).board_members.len(), 1);

    assert_eq!(pending.await.phase, CommandPhase::RolledBack);
    let ids: Vec<_> = current(&h.store)
        .board_members
        .iter()
        .map(|m| m.member_id)
        .collect();
    assert_eq!(ids, vec![MemberId::new(1), MemberId::new(2)]);
}

#[tokio::test]
async fn remove_member_announces_username() {
    let mut h = harness();
    let outcome = h.executor.remove_member(MemberId::new(2)).unwrap().await;

    assert_eq!(outcome.phase, CommandPhase::Reconciled);
    assert_eq!(
        h.notices.try_recv().unwrap(),
        Notice::Success("User linus has been removed from the board".to_string())
    );
}

// ---------------------------------------------------------------------------
// Stale results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_for_replaced_board_is_dropped() {
    let mut h = harness();
    h.service.pause();
    let handle = h.executor.delete_task(TASK).unwrap().spawn();
    wait_for_calls(&h.service, 1).await;

    let mut other = board();
    other.board_id = BoardId::new(2);
    other.name = "Other".to_string();
    h.store.replace(other.clone());
    h.service.resume();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.phase, CommandPhase::Stale);
    assert_eq!(*current(&h.store), other);
    assert!(h.notices.try_recv().is_err());
}

#[tokio::test]
async fn failure_after_close_does_not_roll_back() {
    let mut h = harness();
    h.service.pause();
    h.service.fail_next(RemoteError::Network("offline".to_string()));
    let handle = h.executor.delete_column(TODO).unwrap().spawn();
    wait_for_calls(&h.service, 1).await;

    h.store.clear();
    h.service.resume();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.phase, CommandPhase::Stale);
    assert_eq!(outcome.error, Some(RemoteError::Network("offline".to_string())));
    assert!(h.store.read().is_none());
    assert!(h.notices.try_recv().is_err());
}
