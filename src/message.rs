//! Chat message model shared by the log, the live channel and history loading.
//!
//! DESIGN
//! ======
//! A message is identified by a `MessageId` that starts out temporary
//! (client generated, `temp_` prefix) and is replaced by the backend's
//! permanent id once the server confirms it. Inbound payloads are parsed
//! leniently from `serde_json::Value` so history rows and live events can
//! share one parser.

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Prefix carried by every client-generated id.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Display name used when the identity provider supplies none.
pub const ANONYMOUS_NAME: &str = "Anonymous";

// =============================================================================
// IDS
// =============================================================================

/// Identifier of a message, either temporary or permanent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh temporary id.
    ///
    /// The millisecond clock keeps ids readable in logs; the random suffix
    /// keeps two sends within the same millisecond apart.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!(
            "{TEMP_ID_PREFIX}{}_{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Delivery status of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Shown optimistically, waiting for the server.
    Sending,
    /// Confirmed by the server.
    Sent,
    /// Delivery failed.
    Error,
}

impl DeliveryStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Error)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Error => "error",
        }
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// One entry of the message log.
///
/// Serializes to the camelCase shape the channel expects for a send request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "messageId")]
    pub id: MessageId,
    pub content: String,
    pub sender: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    /// Reason recorded when delivery failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Message {
    /// Build an optimistic entry with a fresh temporary id.
    #[must_use]
    pub fn optimistic(content: &str, sender: &str, sender_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::temporary(),
            content: content.to_owned(),
            sender: sender.to_owned(),
            sender_name: sender_name.to_owned(),
            timestamp,
            status: DeliveryStatus::Sending,
            failure: None,
        }
    }

    /// JSON payload emitted to the live channel for this message.
    #[must_use]
    pub fn send_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A server-confirmed message, from the live channel or from history.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerMessage {
    pub id: MessageId,
    /// Temporary id of the optimistic entry this confirms, if any.
    pub temp_id: Option<MessageId>,
    pub content: String,
    pub sender: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    /// Parse a server payload.
    ///
    /// The id comes from `messageId`, falling back to `id` (string or
    /// integer). `content` is required; a missing timestamp falls back to
    /// `createdAt` and then to the receipt time.
    #[must_use]
    pub fn from_value(data: &Value) -> Option<Self> {
        let id = pick_id(data, &["messageId", "id"])?;
        let content = pick_str(data, &["content"])?.to_owned();
        let temp_id = pick_id(data, &["tempMessageId"]);
        let sender = pick_str(data, &["sender"]).unwrap_or("unknown").to_owned();
        let sender_name = pick_str(data, &["senderName"])
            .unwrap_or(ANONYMOUS_NAME)
            .to_owned();
        let timestamp = ["timestamp", "createdAt"]
            .iter()
            .find_map(|key| data.get(*key).and_then(parse_timestamp))
            .unwrap_or_else(Utc::now);

        Some(Self { id, temp_id, content, sender, sender_name, timestamp })
    }

    /// Convert into a confirmed log entry.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            content: self.content,
            sender: self.sender,
            sender_name: self.sender_name,
            timestamp: self.timestamp,
            status: DeliveryStatus::Sent,
            failure: None,
        }
    }
}

// =============================================================================
// PARSING HELPERS
// =============================================================================

pub(crate) fn pick_str<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
}

pub(crate) fn pick_id(data: &Value, keys: &[&str]) -> Option<MessageId> {
    keys.iter().find_map(|key| match data.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(MessageId::new(s.clone())),
        Value::Number(n) => n.as_i64().map(|n| MessageId::new(n.to_string())),
        _ => None,
    })
}

/// Accepts RFC 3339 strings and epoch milliseconds.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
