//! JSON encoding and decoding for Kanvas wire messages.
//!
//! Real-time frames arrive as text; every failure is mapped into a
//! [`CodecError`] so callers never see `serde_json` types.

use serde::Serialize;

use crate::event::{BoardEvent, NotificationMessage};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The frame carried no content.
    #[error("empty frame")]
    Empty,
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Decodes a board-topic frame into a [`BoardEvent`].
///
/// # Errors
///
/// Returns `CodecError::Empty` for a blank frame and
/// `CodecError::Serialization` for malformed JSON, an unrecognized `type`
/// tag, or a payload that does not match the tag.
pub fn decode_board_message(text: &str) -> Result<BoardEvent, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Decodes a user-topic frame into a [`NotificationMessage`].
///
/// # Errors
///
/// Returns `CodecError::Empty` for a blank frame and
/// `CodecError::Serialization` if the frame is not a notification.
pub fn decode_notification(text: &str) -> Result<NotificationMessage, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Encodes any wire type as a single line of JSON.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}
