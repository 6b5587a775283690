//! Shared event envelope and JSON codec for the live chat channel.
//!
//! Every websocket text message carries one named event and an arbitrary JSON
//! payload: `{"event": "newMessage", "data": {...}}`. This crate owns that
//! envelope; interpreting payloads is left to the consumer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names used on the wire.
pub mod event {
    /// Server → client: socket session established.
    pub const CONNECT: &str = "connect";
    /// Server → client: socket session ended.
    pub const DISCONNECT: &str = "disconnect";
    /// Server → client: a confirmed chat message.
    pub const NEW_MESSAGE: &str = "newMessage";
    /// Server → client: a send request was rejected.
    pub const MESSAGE_ERROR: &str = "messageError";
    /// Both directions: someone is typing.
    pub const TYPING: &str = "typing";
    /// Client → server: send request for an optimistic message.
    pub const MESSAGE: &str = "message";
}

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text was not a JSON object shaped like a [`Frame`].
    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The envelope carried an empty event name.
    #[error("frame has an empty event name")]
    EmptyEvent,
}

/// A single event on the live channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name, e.g. `"newMessage"`.
    pub event: String,
    /// Event payload; `null` when the event carries none.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Build a frame for `event` carrying `data`.
    #[must_use]
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_owned(),
            data,
        }
    }

    /// Build a frame with no payload.
    #[must_use]
    pub fn bare(event: &str) -> Self {
        Self::new(event, Value::Null)
    }
}

/// Encode a frame into its JSON text form.
///
/// Serializing a `String` plus a `serde_json::Value` cannot fail, so an
/// impossible error collapses to an empty string instead of panicking.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode JSON text into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or a missing `event`
/// field, and [`CodecError::EmptyEvent`] when the event name is blank.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let frame = serde_json::from_str::<Frame>(text)?;
    if frame.event.trim().is_empty() {
        return Err(CodecError::EmptyEvent);
    }
    Ok(frame)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
