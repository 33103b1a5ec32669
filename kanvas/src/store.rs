//! Entity store holding the single active board.
//!
//! The store is a `tokio::sync::watch` cell of `Option<Arc<Board>>`. Every
//! applied patch installs a fresh `Arc`, so observers can detect changes by
//! pointer identity, and bumps a monotonically increasing version. Readers
//! must tolerate the board being absent (not loaded yet, or closed) at any
//! time.
//!
//! Every mutation in the crate goes through [`EntityStore::patch`] or
//! [`EntityStore::patch_board`]; nothing holds a private mutable copy of the
//! board beyond one synchronous transformation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kanvas_proto::board::Board;
use kanvas_proto::ids::BoardId;
use tokio::sync::watch;

use crate::ordering;

/// Result of a patch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// A new board was installed.
    Applied,
    /// The transformation produced an equal board; nothing was installed.
    Unchanged,
    /// No board is loaded.
    Absent,
    /// The loaded board is not the one the patch was aimed at.
    Stale,
}

impl PatchOutcome {
    /// Whether the store now holds the patched board.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

struct Inner {
    tx: watch::Sender<Option<Arc<Board>>>,
    version: AtomicU64,
}

/// Shared handle to the board cell. Cloning yields another handle to the
/// same cell.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<Inner>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("board_id", &self.active_board_id())
            .field("version", &self.version())
            .finish()
    }
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                tx,
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the current board, if one is loaded.
    #[must_use]
    pub fn read(&self) -> Option<Arc<Board>> {
        self.inner.tx.borrow().clone()
    }

    /// Identifier of the loaded board.
    #[must_use]
    pub fn active_board_id(&self) -> Option<BoardId> {
        self.inner.tx.borrow().as_ref().map(|b| b.board_id)
    }

    /// Number of boards installed so far (replacements and applied patches).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Subscribes to board changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Board>>> {
        self.inner.tx.subscribe()
    }

    /// Swaps in a whole board, discarding whatever was loaded. Columns and
    /// tasks are sorted by rank on the way in.
    pub fn replace(&self, mut board: Board) {
        ordering::sort_board(&mut board);
        tracing::debug!(board_id = %board.board_id, "board replaced");
        self.inner.tx.send_replace(Some(Arc::new(board)));
        self.inner.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops the loaded board.
    pub fn clear(&self) {
        let previous = self.inner.tx.send_replace(None);
        if previous.is_some() {
            self.inner.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Applies a pure transformation to whichever board is loaded.
    ///
    /// `f` runs while the cell is locked and must not call back into the
    /// store.
    pub fn patch<F>(&self, f: F) -> PatchOutcome
    where
        F: FnOnce(&Board) -> Board,
    {
        self.apply(None, f)
    }

    /// Applies a pure transformation only if `board_id` is still the loaded
    /// board; otherwise returns [`PatchOutcome::Stale`] without calling `f`.
    pub fn patch_board<F>(&self, board_id: BoardId, f: F) -> PatchOutcome
    where
        F: FnOnce(&Board) -> Board,
    {
        self.apply(Some(board_id), f)
    }

    fn apply<F>(&self, expected: Option<BoardId>, f: F) -> PatchOutcome
    where
        F: FnOnce(&Board) -> Board,
    {
        let mut outcome = PatchOutcome::Absent;
        let version = &self.inner.version;
        self.inner.tx.send_if_modified(|slot| {
            let Some(current) = slot.as_ref() else {
                return false;
            };
            if expected.is_some_and(|id| id != current.board_id) {
                outcome = PatchOutcome::Stale;
                return false;
            }
            let next = f(current);
            if next == **current {
                outcome = PatchOutcome::Unchanged;
                return false;
            }
            *slot = Some(Arc::new(next));
            version.fetch_add(1, Ordering::AcqRel);
            outcome = PatchOutcome::Applied;
            true
        });
        outcome
    }
}
