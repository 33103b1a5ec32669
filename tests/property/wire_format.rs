//! Property-based tests for the board message wire format.
//!
//! Uses proptest to verify:
//! 1. Any `BoardEvent` survives encode → decode through the JSON codec.
//! 2. Arbitrary text never panics the decoder (returns `Err` gracefully).
//! 3. `assigneeIds: null` and an absent list both decode as empty.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use kanvas_proto::board::{BoardRole, Member, Priority, TaskStatus, TaskSummary, Visibility};
use kanvas_proto::codec::{decode_board_message, decode_notification, encode_json};
use kanvas_proto::event::*;
use kanvas_proto::ids::{ColumnId, MemberId, Rank, TaskId, UserId};
use proptest::prelude::*;

// --- Strategies for protocol types ---

/// Quarter steps keep ranks exactly representable in decimal JSON.
fn arb_rank() -> impl Strategy<Value = Rank> {
    (-4_000_000..4_000_000i32).prop_map(|n| Rank::new(f64::from(n) / 4.0))
}

fn arb_column_id() -> impl Strategy<Value = ColumnId> {
    (1..10_000i64).prop_map(ColumnId::new)
}

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    (1..10_000i64).prop_map(TaskId::new)
}

fn arb_member_id() -> impl Strategy<Value = MemberId> {
    (1..10_000i64).prop_map(MemberId::new)
}

fn arb_deadline() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0..4_000_000_000i64).prop_filter_map("in range", |secs| {
        DateTime::from_timestamp(secs, 0)
    }))
}

fn arb_role() -> impl Strategy<Value = BoardRole> {
    prop_oneof![
        Just(BoardRole::Admin),
        Just(BoardRole::Editor),
        Just(BoardRole::Viewer),
    ]
}

fn arb_priority() -> impl Strategy<Value = Option<Priority>> {
    prop::option::of(prop_oneof![
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
    ])
}

fn arb_status() -> impl Strategy<Value = Option<TaskStatus>> {
    prop::option::of(prop_oneof![Just(TaskStatus::Active), Just(TaskStatus::Done)])
}

fn arb_member() -> impl Strategy<Value = Member> {
    (arb_member_id(), 1..10_000i64, "[a-z]{1,12}", arb_role()).prop_map(
        |(member_id, user, username, board_role)| Member {
            member_id,
            user_id: UserId::new(user),
            firstname: username.to_uppercase(),
            lastname: String::new(),
            username,
            avatar_color: "#336699".to_string(),
            board_role,
            joined_at: None,
        },
    )
}

fn arb_board_event() -> impl Strategy<Value = BoardEvent> {
    prop_oneof![
        (
            prop::option::of("[^\x00]{1,40}"),
            prop::option::of(".{0,80}"),
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
        arb_member().prop_map(BoardEvent::MemberJoined),
        arb_member_id().prop_map(|member_id| BoardEvent::MemberRemoved(MemberRemoved { member_id })),
        (arb_member_id(), arb_role())
            .prop_map(|(member_id, role)| BoardEvent::RoleChanged(RoleChanged { member_id, role })),
        (arb_column_id(), arb_rank(), "[^\x00]{1,40}").prop_map(|(column_id, order_index, name)| {
            BoardEvent::ColumnCreated(ColumnCreated {
                column_id,
                order_index,
                name,
            })
        }),
        (arb_column_id(), "[^\x00]{1,40}").prop_map(|(column_id, column_name)| {
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
        (arb_column_id(), arb_task_id(), arb_rank(), "[^\x00]{1,40}").prop_map(
            |(column_id, task_id, order_index, title)| BoardEvent::TaskCreated(TaskCreated {
                column_id,
                task_id,
                order_index,
                title,
            })
        ),
        (
            arb_task_id(),
            prop::option::of("[^\x00]{1,40}"),
            arb_deadline(),
            arb_priority(),
            arb_status(),
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

// --- Properties ---

proptest! {
    #[test]
    fn board_event_survives_codec(event in arb_board_event()) {
        let text = encode_json(&event).unwrap();
        let decoded = decode_board_message(&text).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn encoded_event_carries_its_tag(event in arb_board_event()) {
        let value: serde_json::Value = serde_json::from_str(&encode_json(&event).unwrap()).unwrap();
        prop_assert_eq!(value["type"].as_str(), Some(event.tag()));
        prop_assert!(value["payload"].is_object());
    }

    #[test]
    fn arbitrary_text_never_panics(text in ".{0,256}") {
        let _ = decode_board_message(&text);
        let _ = decode_notification(&text);
    }

    #[test]
    fn null_or_missing_assignees_decode_empty(
        task in 1..1000i64,
        column in 1..1000i64,
        include_null in any::<bool>(),
    ) {
        let assignees = if include_null { r#","assigneeIds":null"# } else { "" };
        let json = format!(
            r#"{{"taskId":{task},"orderIndex":1000,"columnId":{column},"title":"t"{assignees}}}"#
        );
        let summary: TaskSummary = serde_json::from_str(&json).unwrap();
        prop_assert!(summary.assignee_ids.is_empty());
        prop_assert_eq!(summary.status, TaskStatus::Active);
    }
}
