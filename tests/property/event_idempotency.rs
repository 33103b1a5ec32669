//! Property-based tests for applying board events.
//!
//! Uses proptest to verify, over boards and events whose identifiers
//! frequently hit existing entities:
//! 1. Applying any event twice yields the same board as applying it once.
//! 2. Columns and each column's tasks stay sorted by (rank, id).
//! 3. A task identifier never appears twice on the board.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use kanvas::ordering::by_rank;
use kanvas::reconcile::apply_event;
use kanvas_proto::board::{
    Board, BoardRole, Column, Member, Priority, TaskStatus, TaskSummary, Visibility,
};
use kanvas_proto::event::*;
use kanvas_proto::ids::{BoardId, ColumnId, MemberId, Rank, TaskId, UserId};
use proptest::prelude::*;

// --- Strategies over a small identifier space ---

fn arb_column_id() -> impl Strategy<Value = ColumnId> {
    (1..6i64).prop_map(ColumnId::new)
}

/// Task ids follow `column * 100 + slot`, matching `arb_board`.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    (1..5i64, 0..5i64).prop_map(|(column, slot)| TaskId::new(column * 100 + slot))
}

fn arb_member_id() -> impl Strategy<Value = MemberId> {
    (1..6i64).prop_map(MemberId::new)
}

fn arb_rank() -> impl Strategy<Value = Rank> {
    (0..40i32).prop_map(|n| Rank::new(f64::from(n) * 250.0))
}

fn arb_role() -> impl Strategy<Value = BoardRole> {
    prop_oneof![
        Just(BoardRole::Admin),
        Just(BoardRole::Editor),
        Just(BoardRole::Viewer),
    ]
}

fn arb_deadline() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0..2_000_000_000i64).prop_filter_map("in range", |secs| {
        DateTime::from_timestamp(secs, 0)
    }))
}

fn member(member_id: MemberId, board_role: BoardRole) -> Member {
    Member {
        member_id,
        user_id: UserId::new(member_id.get() + 1000),
        firstname: format!("F{member_id}"),
        lastname: format!("L{member_id}"),
        username: format!("u{member_id}"),
        avatar_color: "#000000".to_string(),
        board_role,
        joined_at: None,
    }
}

/// Up to three columns, each with up to four tasks, and up to three members.
fn arb_board() -> impl Strategy<Value = Board> {
    (
        prop::collection::vec(0..5usize, 0..4),
        prop::collection::btree_set(arb_member_id(), 0..4),
    )
        .prop_map(|(task_counts, member_ids)| {
            let columns = task_counts
                .iter()
                .enumerate()
                .map(|(i, count)| {
                    let column = i64::try_from(i).unwrap() + 1;
                    let column_id = ColumnId::new(column);
                    let mut c = Column::empty(
                        column_id,
                        Rank::new(f64::from(u32::try_from(column).unwrap()) * 1000.0),
                        format!("Column {column}"),
                    );
                    c.tasks = (0..*count)
                        .map(|slot| {
                            let slot = i64::try_from(slot).unwrap();
                            TaskSummary::fresh(
                                TaskId::new(column * 100 + slot),
                                column_id,
                                Rank::new(f64::from(u32::try_from(slot).unwrap() + 1) * 1000.0),
                                format!("Task {slot}"),
                            )
                        })
                        .collect();
                    c
                })
                .collect();
            Board {
                board_id: BoardId::new(1),
                name: "Board".to_string(),
                description: None,
                created_at: None,
                visibility: Visibility::Private,
                board_role: BoardRole::Admin,
                readonly: false,
                board_members: member_ids
                    .into_iter()
                    .map(|id| member(id, BoardRole::Editor))
                    .collect(),
                columns,
            }
        })
}

fn arb_event() -> impl Strategy<Value = BoardEvent> {
    prop_oneof![
        (
            prop::option::of("[a-z ]{1,20}"),
            prop::option::of("[a-z ]{0,40}"),
            prop::option::of(prop_oneof![
                Just(Visibility::WorkspacePublic),
                Just(Visibility::Private)
            ]),
        )
            .prop_map(|(name, description, visibility)| BoardEvent::BoardUpdated(
                BoardUpdated {
                    name,
                    description,
                    visibility
                }
            )),
        (arb_member_id(), arb_role()).prop_map(|(id, role)| BoardEvent::MemberJoined(member(id, role))),
        arb_member_id().prop_map(|member_id| BoardEvent::MemberRemoved(MemberRemoved { member_id })),
        (arb_member_id(), arb_role())
            .prop_map(|(member_id, role)| BoardEvent::RoleChanged(RoleChanged { member_id, role })),
        (arb_column_id(), arb_rank(), "[a-z]{1,10}").prop_map(|(column_id, order_index, name)| {
            BoardEvent::ColumnCreated(ColumnCreated {
                column_id,
                order_index,
                name,
            })
        }),
        (arb_column_id(), "[a-z]{1,10}").prop_map(|(column_id, column_name)| {
            BoardEvent::ColumnUpdated(ColumnUpdated {
                column_id,
                column_name,
            })
        }),
        (arb_column_id(), arb_rank()).prop_map(|(column_id, new_order_index)| {
            BoardEvent::ColumnMoved(ColumnMoved {
                column_id,
                new_order_index,
            })
        }),
        arb_column_id().prop_map(|column_id| BoardEvent::ColumnDeleted(ColumnDeleted { column_id })),
        (arb_column_id(), arb_task_id(), arb_rank(), "[a-z]{1,10}").prop_map(
            |(column_id, task_id, order_index, title)| BoardEvent::TaskCreated(TaskCreated {
                column_id,
                task_id,
                order_index,
                title,
            })
        ),
        (
            arb_task_id(),
            prop::option::of("[a-z]{1,10}"),
            arb_deadline(),
            prop::option::of(prop_oneof![
                Just(Priority::High),
                Just(Priority::Medium),
                Just(Priority::Low),
            ]),
            prop::option::of(prop_oneof![Just(TaskStatus::Active), Just(TaskStatus::Done)]),
            any::<bool>(),
        )
            .prop_map(|(task_id, title, deadline, priority, task_status, is_expired)| {
                BoardEvent::TaskUpdated(TaskUpdated {
                    task_id,
                    title,
                    deadline,
                    priority,
                    task_status,
                    is_expired,
                })
            }),
        (arb_column_id(), arb_column_id(), arb_task_id(), arb_rank()).prop_map(
            |(before_column_id, target_column_id, task_id, new_order_index)| {
                BoardEvent::TaskMoved(TaskMoved {
                    before_column_id,
                    target_column_id,
                    task_id,
                    new_order_index,
                })
            }
        ),
        arb_task_id().prop_map(|task_id| BoardEvent::TaskDeleted(TaskDeleted { task_id })),
        (arb_task_id(), arb_member_id()).prop_map(|(task_id, board_member_id)| {
            BoardEvent::TaskAssigned(TaskAssignment {
                task_id,
                board_member_id,
            })
        }),
        (arb_task_id(), arb_member_id()).prop_map(|(task_id, board_member_id)| {
            BoardEvent::TaskUnassigned(TaskAssignment {
                task_id,
                board_member_id,
            })
        }),
    ]
}

// --- Invariant checks ---

fn is_sorted(board: &Board) -> bool {
    board.columns.is_sorted_by(|a, b| by_rank(a, b).is_le())
        && board
            .columns
            .iter()
            .all(|c| c.tasks.is_sorted_by(|a, b| by_rank(a, b).is_le()))
}

fn task_ids_unique(board: &Board) -> bool {
    let mut seen = HashSet::new();
    board
        .columns
        .iter()
        .flat_map(|c| &c.tasks)
        .all(|t| seen.insert(t.task_id))
}

fn tasks_know_their_column(board: &Board) -> bool {
    board
        .columns
        .iter()
        .all(|c| c.tasks.iter().all(|t| t.column_id == c.column_id))
}

// --- Properties ---

proptest! {
    #[test]
    fn applying_twice_equals_applying_once(board in arb_board(), event in arb_event()) {
        let once = apply_event(&board, &event);
        let twice = apply_event(&once, &event);
        prop_assert_eq!(twice, once, "event {}", event.tag());
    }

    #[test]
    fn event_sequences_keep_board_invariants(
        board in arb_board(),
        events in prop::collection::vec(arb_event(), 1..30),
    ) {
        let mut current = board;
        for event in &events {
            current = apply_event(&current, event);
            prop_assert!(is_sorted(&current), "unsorted after {}", event.tag());
            prop_assert!(task_ids_unique(&current), "duplicate task after {}", event.tag());
            prop_assert!(tasks_know_their_column(&current), "misfiled task after {}", event.tag());
        }
    }

    #[test]
    fn redelivered_sequence_is_absorbed(
        board in arb_board(),
        events in prop::collection::vec(arb_event(), 1..20),
    ) {
        // Each event delivered twice in a row converges with single delivery.
        let single = events.iter().fold(board.clone(), |b, e| apply_event(&b, e));
        let doubled = events
            .iter()
            .fold(board, |b, e| apply_event(&apply_event(&b, e), e));
        prop_assert_eq!(doubled, single);
    }
}
