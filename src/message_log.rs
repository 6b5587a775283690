//! Ordered message log with optimistic-send reconciliation.
//!
//! DESIGN
//! ======
//! The log is a plain `Vec<Message>` in arrival order. Three mutations are
//! applied in response to external events:
//!
//! - `append_optimistic`: a local submit, appended as `Sending`;
//! - `reconcile_incoming`: a server confirmation, replacing the matching
//!   entry in place or appending when nothing matches; a message never ends
//!   up with two entries;
//! - `mark_failed`: a delivery failure for a still-pending entry.
//!
//! Order is never re-sorted by timestamp; date grouping is a separate,
//! non-mutating projection (see `grouping`).
//!
//! A confirmation that arrives after a failure overrides `Error` to `Sent`:
//! the server holds the message, so showing it as failed would be wrong.

#[cfg(test)]
#[path = "message_log_test.rs"]
mod message_log_test;

use chrono::{DateTime, Utc};

use crate::message::{DeliveryStatus, Message, MessageId, ServerMessage};

/// Error returned when an optimistic append is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("message content is empty")]
    EmptyContent,
}

/// What `reconcile_incoming` did with a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// An existing entry at this index was replaced in place.
    Replaced(usize),
    /// No entry matched; the message was appended at this index.
    Appended(usize),
    /// The entry at this index already holds this confirmation.
    Duplicate(usize),
    /// The optimistic entry was dropped because the confirmed message is
    /// already in the log at this index.
    Merged(usize),
}

#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.entries.iter().find(|m| &m.id == id)
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|m| &m.id == id)
    }

    /// Append a locally submitted message in `Sending` state.
    ///
    /// `content` is trimmed before it is stored. Returns the temporary id.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::EmptyContent`] when `content` is blank.
    pub fn append_optimistic(
        &mut self,
        content: &str,
        sender: &str,
        sender_name: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageId, LogError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(LogError::EmptyContent);
        }
        let message = Message::optimistic(content, sender, sender_name, now);
        let id = message.id.clone();
        self.entries.push(message);
        Ok(id)
    }

    /// Merge a server confirmation into the log.
    ///
    /// The optimistic entry named by the confirmation's temporary id is
    /// replaced in place. If the permanent id is already held by another
    /// entry (history loaded before the echo arrived), the optimistic entry
    /// is removed instead so one message never has two entries. Without a
    /// temporary id match, an entry with the permanent id is replaced unless
    /// it is already `Sent`, in which case redelivery is a no-op.
    pub fn reconcile_incoming(&mut self, incoming: ServerMessage) -> Reconciliation {
        let temp_index = incoming
            .temp_id
            .as_ref()
            .filter(|temp| **temp != incoming.id)
            .and_then(|temp| self.position(temp));
        let id_index = self.position(&incoming.id);

        match (temp_index, id_index) {
            (Some(temp), Some(existing)) => {
                self.entries.remove(temp);
                let existing = if temp < existing { existing - 1 } else { existing };
                if self.entries[existing].status != DeliveryStatus::Sent {
                    self.entries[existing] = incoming.into_message();
                }
                Reconciliation::Merged(existing)
            }
            (Some(index), None) => {
                self.entries[index] = incoming.into_message();
                Reconciliation::Replaced(index)
            }
            (None, Some(index)) => {
                if self.entries[index].status == DeliveryStatus::Sent {
                    return Reconciliation::Duplicate(index);
                }
                self.entries[index] = incoming.into_message();
                Reconciliation::Replaced(index)
            }
            (None, None) => {
                self.entries.push(incoming.into_message());
                Reconciliation::Appended(self.entries.len() - 1)
            }
        }
    }

    /// Mark a pending entry as failed.
    ///
    /// Returns `true` when an entry changed. Unknown ids and entries that
    /// already reached a terminal state are left alone; a failure may race
    /// the confirmation for the same message.
    pub fn mark_failed(&mut self, id: &MessageId, reason: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = DeliveryStatus::Error;
        entry.failure = Some(reason.to_owned());
        true
    }

    /// Merge fetched history (ascending) into the log.
    ///
    /// Rows whose id is already in the log are skipped but move the
    /// insertion point to just after that entry. New rows are inserted at
    /// the insertion point, which starts at the front, so a first load lands
    /// ahead of live entries and a reload slots newer rows after the history
    /// already held. Returns the number of rows inserted.
    pub fn seed_history(&mut self, history: Vec<ServerMessage>) -> usize {
        let mut cursor = 0;
        let mut inserted = 0;

        for row in history {
            if let Some(index) = self.position(&row.id) {
                cursor = cursor.max(index + 1);
                continue;
            }
            self.entries.insert(cursor, row.into_message());
            cursor += 1;
            inserted += 1;
        }

        inserted
    }

    /// Most recent failed entry sent by `sender`.
    #[must_use]
    pub fn last_failed_from(&self, sender: &str) -> Option<&Message> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.status == DeliveryStatus::Error && m.sender == sender)
    }
}
