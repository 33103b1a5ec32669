//! End-to-end tests for a `BoardSession` wired to an in-memory authority.
//!
//! A peer's changes arrive through the loopback event source and land in the
//! session's store; the session's own commands are echoed back and
//! deduplicated; user-topic frames surface as notices; closing the session
//! stops everything.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use kanvas::drag::{Container, DragKind, DragSource, DropOutcome, DropTarget};
use kanvas::executor::{CommandPhase, ExecutorConfig};
use kanvas::notice::Notice;
use kanvas::remote::memory::InMemoryBoardService;
use kanvas::session::{BoardSession, SessionConfig, SessionError};
use kanvas::store::EntityStore;
use kanvas::transport::Topic;
use kanvas_proto::board::{Board, BoardRole, Column, Member, TaskSummary, Visibility};
use kanvas_proto::event::{BoardEvent, ColumnCreated, NotificationType, TaskDeleted};
use kanvas_proto::ids::{BoardId, ColumnId, MemberId, Rank, TaskId, UserId};
use tokio::sync::mpsc;
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BOARD: BoardId = BoardId::new(3);
const ME: UserId = UserId::new(42);
const MY_MEMBERSHIP: MemberId = MemberId::new(1);
const WAIT: Duration = Duration::from_secs(2);

fn board() -> Board {
    let mut todo = Column::empty(ColumnId::new(1), Rank::new(1000.0), "Todo".to_string());
    todo.tasks = vec![
        TaskSummary::fresh(TaskId::new(10), ColumnId::new(1), Rank::new(1000.0), "A".to_string()),
        TaskSummary::fresh(TaskId::new(11), ColumnId::new(1), Rank::new(2000.0), "B".to_string()),
    ];
    Board {
        board_id: BOARD,
        name: "Launch".to_string(),
        description: None,
        created_at: None,
        visibility: Visibility::Private,
        board_role: BoardRole::Admin,
        readonly: false,
        board_members: vec![Member {
            member_id: MY_MEMBERSHIP,
            user_id: ME,
            firstname: "Margaret".to_string(),
            lastname: "Hamilton".to_string(),
            username: "margaret".to_string(),
            avatar_color: "#ff8800".to_string(),
            board_role: BoardRole::Admin,
            joined_at: None,
        }],
        columns: vec![todo],
    }
}

type Session = BoardSession<InMemoryBoardService, kanvas::transport::loopback::LoopbackEventSource>;

async fn open() -> (Session, mpsc::Receiver<Notice>, Arc<InMemoryBoardService>, EntityStore) {
    let service = Arc::new(InMemoryBoardService::new(board()));
    let store = EntityStore::new();
    let (session, notices) = BoardSession::open_in_memory(
        BOARD,
        Arc::clone(&service),
        store.clone(),
        ExecutorConfig::default(),
        SessionConfig::new(ME),
    )
    .await
    .unwrap();
    (session, notices, service, store)
}

/// Waits until the store satisfies `predicate`.
async fn until(store: &EntityStore, predicate: impl Fn(Option<&Board>) -> bool) {
    let mut watcher = store.subscribe();
    timeout(WAIT, watcher.wait_for(|b| predicate(b.as_deref())))
        .await
        .expect("store never reached the expected state")
        .unwrap();
}

/// Next notice matching `predicate`, skipping others.
async fn next_notice(rx: &mut mpsc::Receiver<Notice>, predicate: impl Fn(&Notice) -> bool) -> Notice {
    timeout(WAIT, async {
        loop {
            let notice = rx.recv().await.expect("notice channel closed");
            if predicate(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("expected notice never arrived")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_loads_board_and_goes_live() {
    let (session, _notices, service, store) = open().await;

    assert_eq!(session.board_id(), BOARD);
    assert_eq!(store.active_board_id(), Some(BOARD));
    assert_eq!(*session.store().read().unwrap(), board());
    assert!(session.is_live());
    assert_eq!(service.calls(), vec!["get_board"]);

    session.close().await;
}

#[tokio::test]
async fn open_unknown_board_fails_without_touching_store() {
    let service = Arc::new(InMemoryBoardService::new(board()));
    let store = EntityStore::new();

    let result = BoardSession::open_in_memory(
        BoardId::new(404),
        service,
        store.clone(),
        ExecutorConfig::default(),
        SessionConfig::new(ME),
    )
    .await;

    let Err(SessionError::Load(error)) = result else {
        panic!("expected load failure");
    };
    assert!(error.to_string().contains("404"));
    assert!(store.read().is_none());
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn peer_changes_reach_the_store() {
    let (session, _notices, service, store) = open().await;

    service
        .broadcast(&BoardEvent::ColumnCreated(ColumnCreated {
            column_id: ColumnId::new(50),
            order_index: Rank::new(500.0),
            name: "Inbox".to_string(),
        }))
        .await;
    service
        .broadcast(&BoardEvent::TaskDeleted(TaskDeleted {
            task_id: TaskId::new(11),
        }))
        .await;

    until(&store, |b| {
        b.is_some_and(|b| b.column(ColumnId::new(50)).is_some() && b.find_task(TaskId::new(11)).is_none())
    })
    .await;
    let board = store.read().unwrap();
    assert_eq!(board.columns[0].name, "Inbox");
    assert_eq!(board.columns[0].column_id, ColumnId::new(50));

    session.close().await;
}

#[tokio::test]
async fn own_create_is_not_duplicated_by_its_echo() {
    let (session, _notices, service, store) = open().await;

    let outcome = session
        .executor()
        .create_task(ColumnId::new(1), "C")
        .unwrap()
        .await;
    assert_eq!(outcome.phase, CommandPhase::Reconciled);

    // Let the listener apply the TASK_CREATED echo too.
    service
        .broadcast(&BoardEvent::ColumnCreated(ColumnCreated {
            column_id: ColumnId::new(60),
            order_index: Rank::new(9000.0),
            name: "Marker".to_string(),
        }))
        .await;
    until(&store, |b| b.is_some_and(|b| b.column(ColumnId::new(60)).is_some())).await;

    let board = store.read().unwrap();
    let titles: Vec<_> = board
        .column(ColumnId::new(1))
        .unwrap()
        .tasks
        .iter()
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
    assert_eq!(*board, service.board_snapshot());

    session.close().await;
}

#[tokio::test]
async fn assignment_notification_reaches_notices() {
    let (session, mut notices, _service, _store) = open().await;

    let outcome = session
        .executor()
        .assign_task(TaskId::new(10), MY_MEMBERSHIP)
        .unwrap()
        .await;
    assert_eq!(outcome.phase, CommandPhase::Reconciled);

    let Notice::Notification(message) =
        next_notice(&mut notices, |n| matches!(n, Notice::Notification(_))).await
    else {
        unreachable!();
    };
    assert_eq!(message.kind, NotificationType::Assignment);
    assert_eq!(message.user_id, ME);
    assert_eq!(message.payload["boardName"], "Launch");
    assert_eq!(message.payload["taskId"], 10);

    session.close().await;
}

#[tokio::test]
async fn malformed_board_frame_becomes_warning() {
    let (session, mut notices, service, store) = open().await;
    let version = store.version();

    service.publish_raw(Topic::Board(BOARD), "{\"type\":\"BROKEN\"}").await;

    let warning = next_notice(&mut notices, |n| matches!(n, Notice::Warning(_))).await;
    assert!(warning.text().unwrap().starts_with("Failed to parse board message"));
    assert_eq!(store.version(), version);
    assert!(session.is_live());

    session.close().await;
}

#[tokio::test]
async fn drag_through_session_updates_both_sides() {
    let (session, _notices, service, store) = open().await;

    session
        .drag()
        .pick_up(DragSource {
            kind: DragKind::Task,
            container: Container::Column(ColumnId::new(1)),
            index: 1,
        })
        .unwrap();
    let DropOutcome::Dispatched { handle, .. } = session.drag().drop_at(Some(DropTarget {
        container: Container::Column(ColumnId::new(1)),
        index: 0,
    })) else {
        panic!("expected dispatched move");
    };
    assert_eq!(handle.await.unwrap().phase, CommandPhase::Reconciled);

    let order: Vec<_> = store.read().unwrap().columns[0]
        .tasks
        .iter()
        .map(|t| t.task_id)
        .collect();
    assert_eq!(order, vec![TaskId::new(11), TaskId::new(10)]);
    let authority: Vec<_> = service.board_snapshot().columns[0]
        .tasks
        .iter()
        .map(|t| t.task_id)
        .collect();
    assert_eq!(authority, order);

    session.close().await;
}

#[tokio::test]
async fn close_clears_store_and_stops_applying() {
    let (session, _notices, service, store) = open().await;
    let executor = session.executor().clone();

    session.close().await;
    assert!(store.read().is_none());

    service
        .broadcast(&BoardEvent::ColumnCreated(ColumnCreated {
            column_id: ColumnId::new(70),
            order_index: Rank::new(100.0),
            name: "Late".to_string(),
        }))
        .await;
    tokio::task::yield_now().await;
    assert!(store.read().is_none());
    assert!(executor.create_column("After close").is_err());
}
