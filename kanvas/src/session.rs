//! Board session: wires the engine to a remote authority and an event
//! source for one open board.
//!
//! # Architecture
//!
//! ```text
//! caller ── commands ──> OptimisticExecutor ──> BoardCommands (remote)
//!                              │
//!                              ▼
//!                         EntityStore <── EventReconciler <── listener task <── EventSource
//!                                                                  │
//! caller <──────────────────────── Notice ─────────────────────────┘
//! ```
//!
//! [`BoardSession::open`] subscribes to the board and user topics, loads the
//! board into the injected store, and spawns the listener. Board frames go
//! through the reconciler; user frames become [`Notice::Notification`]s.
//! [`BoardSession::close`] stops the listener and clears the store, after
//! which results of in-flight commands are dropped as stale.

use std::sync::Arc;

use kanvas_proto::ids::{BoardId, UserId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::drag::DragController;
use crate::executor::{ExecutorConfig, OptimisticExecutor};
use crate::notice::{self, Notice};
use crate::reconcile::EventReconciler;
use crate::remote::memory::InMemoryBoardService;
use crate::remote::{BoardCommands, RemoteError};
use crate::store::EntityStore;
use crate::transport::loopback::LoopbackEventSource;
use crate::transport::{EventSource, Topic, TransportError};

/// Default capacity of the notice channel.
const DEFAULT_NOTICE_BUFFER: usize = 64;

/// Default capacity of event source channels created for a session.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Errors raised while opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The initial board fetch failed.
    #[error("failed to load board: {0}")]
    Load(#[from] RemoteError),
}

/// Configuration for a board session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The viewer; selects the user topic and signs assignments.
    pub user_id: UserId,
    /// Capacity of the notice channel.
    pub notice_buffer: usize,
    /// Capacity of event source channels created for the session.
    pub channel_capacity: usize,
}

impl SessionConfig {
    /// Creates a `SessionConfig` with default channel capacities.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            notice_buffer: DEFAULT_NOTICE_BUFFER,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// One open board.
pub struct BoardSession<R, S> {
    board_id: BoardId,
    store: EntityStore,
    executor: OptimisticExecutor<R>,
    drag: DragController<R>,
    source: Arc<S>,
    topics: [Topic; 2],
    shutdown: oneshot::Sender<()>,
    listener: JoinHandle<()>,
}

impl<R, S> BoardSession<R, S>
where
    R: BoardCommands,
    S: EventSource + 'static,
{
    /// Opens `board_id`.
    ///
    /// Returns the session and the receiver for every [`Notice`] it emits
    /// (command confirmations and failures, dropped frames, user
    /// notifications).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Load`] if the board cannot be fetched; the
    /// topics are unsubscribed again and the store is left untouched.
    pub async fn open(
        board_id: BoardId,
        remote: Arc<R>,
        source: Arc<S>,
        store: EntityStore,
        executor_config: ExecutorConfig,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<Notice>), SessionError> {
        // Subscribe first so nothing published during the fetch is lost.
        let topics = [Topic::Board(board_id), Topic::User(config.user_id)];
        for topic in topics {
            source.subscribe(topic);
        }

        let board = match remote.get_board(board_id).await {
            Ok(board) => board,
            Err(e) => {
                tracing::warn!(board_id = %board_id, error = %e, "board load failed");
                for topic in &topics {
                    source.unsubscribe(topic);
                }
                return Err(e.into());
            }
        };
        store.replace(board);

        let (notice_tx, notice_rx) = mpsc::channel(config.notice_buffer);
        let executor = OptimisticExecutor::with_notices(
            store.clone(),
            remote,
            config.user_id,
            executor_config,
            notice_tx.clone(),
        );
        let drag = DragController::new(executor.clone());
        let reconciler = EventReconciler::new(store.clone(), board_id, notice_tx.clone());

        let (shutdown, shutdown_rx) = oneshot::channel();
        let listener = tokio::spawn(listen(
            Arc::clone(&source),
            reconciler,
            notice_tx,
            shutdown_rx,
        ));
        tracing::info!(board_id = %board_id, "board session opened");

        Ok((
            Self {
                board_id,
                store,
                executor,
                drag,
                source,
                topics,
                shutdown,
                listener,
            },
            notice_rx,
        ))
    }

    /// Board this session shows.
    #[must_use]
    pub const fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Store holding the board.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Command executor for this board.
    #[must_use]
    pub const fn executor(&self) -> &OptimisticExecutor<R> {
        &self.executor
    }

    /// Drag controller for this board.
    #[must_use]
    pub const fn drag(&self) -> &DragController<R> {
        &self.drag
    }

    /// Whether real-time frames are still being applied.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.source.is_connected() && !self.listener.is_finished()
    }

    /// Stops the listener, unsubscribes, and clears the store if it still
    /// holds this board.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.listener.await {
            tracing::warn!(board_id = %self.board_id, error = %e, "listener task failed");
        }
        for topic in &self.topics {
            self.source.unsubscribe(topic);
        }
        if self.store.active_board_id() == Some(self.board_id) {
            self.store.clear();
        }
        tracing::info!(board_id = %self.board_id, "board session closed");
    }
}

impl BoardSession<InMemoryBoardService, LoopbackEventSource> {
    /// Opens `board_id` against an in-memory authority, subscribing a fresh
    /// loopback source to it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Load`] if the board is unknown to `service`.
    pub async fn open_in_memory(
        board_id: BoardId,
        service: Arc<InMemoryBoardService>,
        store: EntityStore,
        executor_config: ExecutorConfig,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<Notice>), SessionError> {
        let source = Arc::new(service.subscribe(config.channel_capacity));
        Self::open(board_id, service, source, store, executor_config, config).await
    }
}

/// Background task: routes frames until shutdown or until the source
/// closes.
async fn listen<S: EventSource>(
    source: Arc<S>,
    reconciler: EventReconciler,
    notices: mpsc::Sender<Notice>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let board_topic = Topic::Board(reconciler.board_id());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(board_id = %reconciler.board_id(), "listener shutting down");
                break;
            }
            frame = source.recv() => {
                match frame {
                    Ok(frame) if frame.topic == board_topic => {
                        reconciler.handle_raw(&frame.body);
                    }
                    Ok(frame) => match frame.topic {
                        Topic::User(_) => match frame.decode_notification() {
                            Ok(message) => notice::emit(&notices, Notice::Notification(message)),
                            Err(e) => tracing::warn!(topic = %frame.topic, error = %e, "dropping undecodable notification"),
                        },
                        Topic::Board(_) => tracing::debug!(topic = %frame.topic, "frame for another board ignored"),
                    },
                    Err(TransportError::ConnectionClosed) => {
                        tracing::info!(board_id = %reconciler.board_id(), "event source closed");
                        break;
                    }
                    Err(e) => tracing::warn!(error = %e, "event source error"),
                }
            }
        }
    }
}
