//! In-memory board authority.
//!
//! [`InMemoryBoardService`] answers [`BoardCommands`] from a board held in
//! memory, assigns ranks with the same neighbor rule the engine uses, and
//! publishes the resulting events to every [`LoopbackEventSource`] obtained
//! from [`subscribe`](InMemoryBoardService::subscribe). Responses can be held
//! back with [`pause`](InMemoryBoardService::pause) so tests can deliver the
//! real-time echo before the response, and a failure can be queued with
//! [`fail_next`](InMemoryBoardService::fail_next).

use std::collections::HashMap;

use chrono::Utc;
use kanvas_proto::board::{Board, Column, TaskDetail, TaskSummary};
use kanvas_proto::codec::encode_json;
use kanvas_proto::command::{
    AssignmentRequest, BoardUpdateRequest, ColumnRequest, ColumnResponse, CreatedTask,
    MoveColumnRequest, MoveTaskRequest, MovedColumn, MovedTask, RoleChangeRequest, TaskRequest,
    TaskUpdateRequest,
};
use kanvas_proto::event::{
    BoardEvent, BoardUpdated, ColumnCreated, ColumnDeleted, ColumnMoved, ColumnUpdated,
    MemberRemoved, NotificationMessage, NotificationStatus, NotificationType, RoleChanged,
    TaskAssignment, TaskCreated, TaskDeleted, TaskMoved, TaskUpdated,
};
use kanvas_proto::ids::{BoardId, ColumnId, MemberId, Rank, TaskId, UserId};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::sync::watch;

use super::{BoardCommands, RemoteError};
use crate::ordering::{rank_after_last, rank_between, sort_board};
use crate::patch::{self, BoardFields, TaskFields};
use crate::reconcile::apply_event;
use crate::transport::Topic;
use crate::transport::loopback::{LoopbackEventSource, LoopbackPublisher};

/// Default spacing between ranks.
pub const DEFAULT_STEP: f64 = 1000.0;

/// Frames produced by one command, published after the state lock is
/// released.
type Outbox = Vec<(Topic, String)>;

struct State {
    board: Board,
    descriptions: HashMap<TaskId, String>,
    next_id: i64,
    next_notification: i64,
    fail_next: Option<RemoteError>,
}

impl State {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn expect_board(&self, board_id: BoardId) -> Result<(), RemoteError> {
        if self.board.board_id == board_id {
            Ok(())
        } else {
            Err(RemoteError::not_found(format!("Board {board_id} not found")))
        }
    }

    fn column(&self, column_id: ColumnId) -> Result<&Column, RemoteError> {
        self.board
            .column(column_id)
            .ok_or_else(|| RemoteError::not_found(format!("Column {column_id} not found")))
    }

    fn task(&self, task_id: TaskId) -> Result<&TaskSummary, RemoteError> {
        self.board
            .find_task(task_id)
            .ok_or_else(|| RemoteError::not_found(format!("Task {task_id} not found")))
    }

    fn detail(&self, task_id: TaskId) -> Result<TaskDetail, RemoteError> {
        let task = self.task(task_id)?;
        Ok(TaskDetail {
            task_id: task.task_id,
            order_index: task.order_index,
            column_id: task.column_id,
            title: task.title.clone(),
            description: self.descriptions.get(&task_id).cloned(),
            created_at: None,
            deadline: task.deadline,
            status: task.status,
            priority: task.priority,
            assignee_ids: task.assignee_ids.clone(),
            is_expired: task.is_expired,
        })
    }

    fn notification(&mut self, user_id: UserId, kind: NotificationType, payload: Value) -> NotificationMessage {
        self.next_notification += 1;
        NotificationMessage {
            notification_id: self.next_notification,
            user_id,
            kind,
            status: NotificationStatus::Unread,
            sent_at: Some(Utc::now().naive_utc()),
            payload: match payload {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

fn frame(outbox: &mut Outbox, topic: Topic, value: &impl serde::Serialize) {
    match encode_json(value) {
        Ok(body) => outbox.push((topic, body)),
        Err(e) => tracing::warn!(%topic, error = %e, "failed to encode outgoing frame"),
    }
}

/// Board authority backed by in-memory state.
pub struct InMemoryBoardService {
    state: Mutex<State>,
    publishers: Mutex<Vec<LoopbackPublisher>>,
    calls: Mutex<Vec<&'static str>>,
    paused: watch::Sender<bool>,
    step: f64,
}

impl InMemoryBoardService {
    /// Serves `board`. Fresh identifiers continue after the largest one in
    /// it.
    #[must_use]
    pub fn new(mut board: Board) -> Self {
        sort_board(&mut board);
        let largest = board
            .columns
            .iter()
            .flat_map(|c| {
                std::iter::once(c.column_id.get()).chain(c.tasks.iter().map(|t| t.task_id.get()))
            })
            .max()
            .unwrap_or(0);
        let (paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(State {
                board,
                descriptions: HashMap::new(),
                next_id: largest.max(0) + 1,
                next_notification: 0,
                fail_next: None,
            }),
            publishers: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            paused,
            step: DEFAULT_STEP,
        }
    }

    /// Uses `step` as the rank spacing.
    #[must_use]
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Creates an event source that receives every frame published from
    /// now on. The caller still has to subscribe it to topics.
    #[must_use]
    pub fn subscribe(&self, buffer: usize) -> LoopbackEventSource {
        let (publisher, source) = LoopbackEventSource::create_pair(buffer);
        self.publishers.lock().push(publisher);
        source
    }

    /// Holds back responses. Mutations and published events still happen.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Releases held responses.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Makes the next command fail with `error` without touching state.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Names of the calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Copy of the authoritative board.
    #[must_use]
    pub fn board_snapshot(&self) -> Board {
        self.state.lock().board.clone()
    }

    /// Applies `event` as another client would have caused it and publishes
    /// it on the board topic.
    pub async fn broadcast(&self, event: &BoardEvent) {
        let mut outbox = Outbox::new();
        let board_id = {
            let mut state = self.state.lock();
            state.board = apply_event(&state.board, event);
            state.board.board_id
        };
        frame(&mut outbox, Topic::Board(board_id), event);
        self.publish(outbox).await;
    }

    /// Publishes a raw frame, bypassing the state.
    pub async fn publish_raw(&self, topic: Topic, body: &str) {
        self.publish(vec![(topic, body.to_string())]).await;
    }

    async fn publish(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }
        let publishers = {
            let mut publishers = self.publishers.lock();
            publishers.retain(|p| !p.is_closed());
            publishers.clone()
        };
        for (topic, body) in outbox {
            for publisher in &publishers {
                if publisher.publish(topic, body.clone()).await.is_err() {
                    tracing::debug!(%topic, "subscriber gone");
                }
            }
        }
    }

    async fn wait_until_resumed(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// Runs one command: records it, applies `op` under the state lock,
    /// publishes what it produced, then answers once not paused.
    async fn run<T, F>(&self, name: &'static str, board_id: BoardId, op: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&mut State, f64, &mut Outbox) -> Result<T, RemoteError>,
    {
        self.calls.lock().push(name);
        let mut outbox = Outbox::new();
        let result = {
            let mut state = self.state.lock();
            match state.fail_next.take() {
                Some(error) => Err(error),
                None => state
                    .expect_board(board_id)
                    .and_then(|()| op(&mut state, self.step, &mut outbox)),
            }
        };
        self.publish(outbox).await;
        self.wait_until_resumed().await;
        if let Err(e) = &result {
            tracing::debug!(call = name, error = %e, "in-memory call failed");
        }
        result
    }
}

impl BoardCommands for InMemoryBoardService {
    async fn get_board(&self, board_id: BoardId) -> Result<Board, RemoteError> {
        self.run("get_board", board_id, |state, _, _| Ok(state.board.clone()))
            .await
    }

    async fn get_task(&self, board_id: BoardId, task_id: TaskId) -> Result<TaskDetail, RemoteError> {
        self.run("get_task", board_id, |state, _, _| state.detail(task_id))
            .await
    }

    async fn create_column(
        &self,
        board_id: BoardId,
        request: ColumnRequest,
    ) -> Result<ColumnResponse, RemoteError> {
        self.run("create_column", board_id, |state, step, outbox| {
            let column_id = ColumnId::new(state.allocate());
            let order_index = rank_after_last(&state.board.columns, step);
            let column = Column::empty(column_id, order_index, request.name.clone());
            state.board = patch::insert_column(&state.board, &column);
            let event = BoardEvent::ColumnCreated(ColumnCreated {
                column_id,
                order_index,
                name: request.name.clone(),
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(ColumnResponse {
                column_id,
                name: request.name,
                order_index,
            })
        })
        .await
    }

    async fn rename_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
        request: ColumnRequest,
    ) -> Result<(), RemoteError> {
        self.run("rename_column", board_id, |state, _, outbox| {
            state.column(column_id)?;
            state.board = patch::rename_column(&state.board, column_id, &request.name);
            let event = BoardEvent::ColumnUpdated(ColumnUpdated {
                column_id,
                column_name: request.name,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(())
        })
        .await
    }

    async fn delete_column(&self, board_id: BoardId, column_id: ColumnId) -> Result<(), RemoteError> {
        self.run("delete_column", board_id, |state, _, outbox| {
            state.column(column_id)?;
            state.board = patch::remove_column(&state.board, column_id);
            let event = BoardEvent::ColumnDeleted(ColumnDeleted { column_id });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(())
        })
        .await
    }

    async fn move_column(
        &self,
        board_id: BoardId,
        request: MoveColumnRequest,
    ) -> Result<MovedColumn, RemoteError> {
        self.run("move_column", board_id, |state, step, outbox| {
            let column_id = state.column(request.column_id)?.column_id;
            // Unknown neighbors are refused, as the board endpoint does.
            let rank_of = |id: Option<ColumnId>| {
                id.filter(|id| *id != column_id)
                    .map(|id| state.column(id).map(|c| c.order_index))
                    .transpose()
            };
            let order_index = rank_between(
                rank_of(request.preceding_column_id)?,
                rank_of(request.following_column_id)?,
                step,
            );
            state.board = patch::set_column_rank(&state.board, column_id, order_index);
            let event = BoardEvent::ColumnMoved(ColumnMoved {
                column_id,
                new_order_index: order_index,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(MovedColumn {
                column_id,
                order_index,
            })
        })
        .await
    }

    async fn create_task(&self, board_id: BoardId, request: TaskRequest) -> Result<CreatedTask, RemoteError> {
        self.run("create_task", board_id, |state, step, outbox| {
            let order_index = rank_after_last(&state.column(request.column_id)?.tasks, step);
            let task_id = TaskId::new(state.allocate());
            let task = TaskSummary::fresh(task_id, request.column_id, order_index, request.title.clone());
            state.board = patch::insert_task(&state.board, &task);
            let event = BoardEvent::TaskCreated(TaskCreated {
                column_id: request.column_id,
                task_id,
                order_index,
                title: request.title,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(CreatedTask {
                task_id,
                column_id: request.column_id,
                order_index,
                is_expired: false,
            })
        })
        .await
    }

    async fn update_task(
        &self,
        board_id: BoardId,
        request: TaskUpdateRequest,
    ) -> Result<TaskDetail, RemoteError> {
        self.run("update_task", board_id, |state, _, outbox| {
            let task_id = state.task(request.task_id)?.task_id;
            let fields = TaskFields {
                title: request.title.clone(),
                deadline: request.deadline,
                priority: request.priority,
                status: request.status,
                is_expired: request.deadline.map(|d| d < Utc::now()),
            };
            state.board = patch::update_task(&state.board, task_id, &fields);
            if let Some(description) = request.description {
                state.descriptions.insert(task_id, description);
            }
            let detail = state.detail(task_id)?;
            let event = BoardEvent::TaskUpdated(TaskUpdated {
                task_id,
                title: request.title,
                deadline: request.deadline,
                priority: request.priority,
                task_status: request.status,
                is_expired: detail.is_expired,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(detail)
        })
        .await
    }

    async fn move_task(&self, board_id: BoardId, request: MoveTaskRequest) -> Result<MovedTask, RemoteError> {
        self.run("move_task", board_id, |state, step, outbox| {
            let before_column_id = state.task(request.task_id)?.column_id;
            let target = state.column(request.target_column_id)?;
            let rank_of = |id: Option<TaskId>| {
                id.filter(|id| *id != request.task_id)
                    .map(|id| {
                        target
                            .task(id)
                            .map(|t| t.order_index)
                            .ok_or_else(|| RemoteError::not_found(format!("Task {id} not found")))
                    })
                    .transpose()
            };
            let order_index: Rank = rank_between(
                rank_of(request.preceding_task_id)?,
                rank_of(request.following_task_id)?,
                step,
            );
            state.board = patch::move_task(
                &state.board,
                request.task_id,
                request.target_column_id,
                order_index,
            );
            let event = BoardEvent::TaskMoved(TaskMoved {
                before_column_id,
                target_column_id: request.target_column_id,
                task_id: request.task_id,
                new_order_index: order_index,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(MovedTask {
                task_id: request.task_id,
                column_id: request.target_column_id,
                order_index,
            })
        })
        .await
    }

    async fn delete_task(&self, board_id: BoardId, task_id: TaskId) -> Result<(), RemoteError> {
        self.run("delete_task", board_id, |state, _, outbox| {
            state.task(task_id)?;
            state.board = patch::remove_task(&state.board, task_id);
            state.descriptions.remove(&task_id);
            frame(outbox, Topic::Board(board_id), &BoardEvent::TaskDeleted(TaskDeleted { task_id }));
            Ok(())
        })
        .await
    }

    async fn assign_task(&self, board_id: BoardId, request: AssignmentRequest) -> Result<(), RemoteError> {
        self.run("assign_task", board_id, |state, _, outbox| {
            assign(state, board_id, &request, true, outbox)
        })
        .await
    }

    async fn unassign_task(
        &self,
        board_id: BoardId,
        request: AssignmentRequest,
    ) -> Result<(), RemoteError> {
        self.run("unassign_task", board_id, |state, _, outbox| {
            assign(state, board_id, &request, false, outbox)
        })
        .await
    }

    async fn update_board(&self, board_id: BoardId, request: BoardUpdateRequest) -> Result<(), RemoteError> {
        self.run("update_board", board_id, |state, _, outbox| {
            let fields = BoardFields {
                name: request.name.clone(),
                description: request.description.clone(),
                visibility: request.visibility,
            };
            state.board = patch::update_board(&state.board, &fields);
            let event = BoardEvent::BoardUpdated(BoardUpdated {
                name: request.name,
                description: request.description,
                visibility: request.visibility,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(())
        })
        .await
    }

    async fn change_member_role(
        &self,
        board_id: BoardId,
        request: RoleChangeRequest,
    ) -> Result<(), RemoteError> {
        self.run("change_member_role", board_id, |state, _, outbox| {
            if state.board.member(request.member_id).is_none() {
                return Err(RemoteError::not_found(format!(
                    "Member {} not found",
                    request.member_id
                )));
            }
            state.board = patch::set_member_role(&state.board, request.member_id, request.role);
            let event = BoardEvent::RoleChanged(RoleChanged {
                member_id: request.member_id,
                role: request.role,
            });
            frame(outbox, Topic::Board(board_id), &event);
            Ok(())
        })
        .await
    }

    async fn remove_member(&self, board_id: BoardId, member_id: MemberId) -> Result<(), RemoteError> {
        self.run("remove_member", board_id, |state, _, outbox| {
            let member = state
                .board
                .member(member_id)
                .cloned()
                .ok_or_else(|| RemoteError::not_found(format!("Member {member_id} not found")))?;
            state.board = patch::remove_member(&state.board, member_id);
            frame(
                outbox,
                Topic::Board(board_id),
                &BoardEvent::MemberRemoved(MemberRemoved { member_id }),
            );
            let payload = json!({ "boardId": board_id, "boardName": state.board.name });
            let notice = state.notification(member.user_id, NotificationType::RemovedFromBoard, payload);
            frame(outbox, Topic::User(member.user_id), &notice);
            Ok(())
        })
        .await
    }
}

fn assign(
    state: &mut State,
    board_id: BoardId,
    request: &AssignmentRequest,
    assigned: bool,
    outbox: &mut Outbox,
) -> Result<(), RemoteError> {
    state.task(request.task_id)?;
    if state.board.member(request.member_id).is_none() {
        return Err(RemoteError::not_found(format!(
            "Member {} not found",
            request.member_id
        )));
    }
    state.board = patch::set_assignee(&state.board, request.task_id, request.member_id, assigned);
    let assignment = TaskAssignment {
        task_id: request.task_id,
        board_member_id: request.member_id,
    };
    let event = if assigned {
        BoardEvent::TaskAssigned(assignment)
    } else {
        BoardEvent::TaskUnassigned(assignment)
    };
    frame(outbox, Topic::Board(board_id), &event);
    if assigned {
        let payload = json!({
            "taskId": request.task_id,
            "boardId": board_id,
            "boardName": request.board_name,
            "assignerId": request.assigner_id,
        });
        let notice = state.notification(request.user_id, NotificationType::Assignment, payload);
        frame(outbox, Topic::User(request.user_id), &notice);
    }
    Ok(())
}
