//! User-visible notices (toasts) emitted by the engine.

use kanvas_proto::event::NotificationMessage;
use tokio::sync::mpsc;

/// Generic message shown when a failure carries no server text.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// A notice for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A command the user should hear about succeeded.
    Success(String),
    /// A command failed.
    Error(String),
    /// Something was dropped without affecting the board.
    Warning(String),
    /// A message arrived on the user's private topic.
    Notification(NotificationMessage),
}

impl Notice {
    /// Text of the notice, if it has one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(s) | Self::Error(s) | Self::Warning(s) => Some(s),
            Self::Notification(_) => None,
        }
    }
}

/// Emits a notice without blocking. A full or closed channel drops it.
pub(crate) fn emit(tx: &mpsc::Sender<Notice>, notice: Notice) {
    if let Err(e) = tx.try_send(notice) {
        tracing::debug!(error = %e, "notice dropped");
    }
}
