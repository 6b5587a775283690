//! Chat session controller.
//!
//! DESIGN
//! ======
//! `ChatSession` owns the `MessageLog`, the connection flag, the typing
//! indicator and the last load error, and holds the live channel handle it
//! was constructed with. Every mutation happens on the task that owns the
//! session: local submits are direct calls, channel events arrive through a
//! `Subscription` and are applied by `handle_event`, and the typing clear is
//! raced against the next event in `step`.
//!
//! ERROR HANDLING
//! ==============
//! Failures become state at the point they occur. A failed emit marks the
//! message `Error` in the log and is also returned to the caller; a failed
//! history load is kept in `error` until the next successful load or
//! `dismiss_error`. Nothing here is fatal.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, LiveChannel, Subscription};
use crate::grouping::{DisplayItem, group_by_day};
use crate::history::HistoryFetcher;
use crate::identity::Identity;
use crate::message::{Message, MessageId};
use crate::message_log::{LogError, MessageLog, Reconciliation};
use crate::typing::{TypingIndicator, sleep_until_deadline};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("failed to load message history: {0}")]
    Load(String),
    #[error("message {id} failed to send: {reason}")]
    Send { id: MessageId, reason: String },
    #[error("not connected to the chat server")]
    ChannelDisconnected,
    #[error("message is empty")]
    EmptyMessage,
}

impl From<LogError> for ChatError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::EmptyContent => Self::EmptyMessage,
        }
    }
}

/// What applying one event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    Disconnected,
    Message(Reconciliation),
    /// A delivery failure arrived; `applied` is false when no pending entry
    /// matched.
    SendFailed { id: MessageId, applied: bool },
    TypingStarted,
    TypingCleared,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct ChatSession<C: LiveChannel> {
    identity: Identity,
    channel: Arc<C>,
    log: MessageLog,
    connected: bool,
    loading: bool,
    error: Option<ChatError>,
    typing: TypingIndicator,
}

impl<C: LiveChannel> ChatSession<C> {
    #[must_use]
    pub fn new(identity: Identity, channel: Arc<C>, typing_decay: Duration) -> Self {
        let connected = channel.is_connected();
        Self {
            identity,
            channel,
            log: MessageLog::new(),
            connected,
            loading: true,
            error: None,
            typing: TypingIndicator::new(typing_decay),
        }
    }

    /// Register for this session's channel events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.channel.subscribe()
    }

    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// `true` until the first history load finishes.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&ChatError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn typing_active(&self) -> bool {
        self.typing.is_active()
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// Load history and merge it into the log.
    ///
    /// Returns the number of rows added. Calling again reloads: rows already
    /// in the log are skipped and newer rows land after the history already
    /// held.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Load`] when the fetch fails. The error is also
    /// kept in [`ChatSession::error`].
    pub async fn load_history(&mut self, fetcher: &dyn HistoryFetcher) -> Result<usize, ChatError> {
        self.loading = true;
        let result = fetcher.fetch_history().await;
        self.loading = false;

        match result {
            Ok(rows) => {
                let inserted = self.log.seed_history(rows);
                self.error = None;
                info!(inserted, total = self.log.len(), "history loaded");
                Ok(inserted)
            }
            Err(e) => {
                warn!(error = %e, "history load failed");
                let err = ChatError::Load(e.to_string());
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Local actions
    // -------------------------------------------------------------------------

    /// Append `content` optimistically and emit it on the channel.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyMessage`] when `content` is blank; nothing changes.
    /// - [`ChatError::ChannelDisconnected`] while offline; nothing changes.
    /// - [`ChatError::Send`] when the emit fails. The entry stays in the log
    ///   marked `Error` and is not retried.
    pub fn append_optimistic(&mut self, content: &str) -> Result<MessageId, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.connected {
            return Err(ChatError::ChannelDisconnected);
        }

        let id = self.log.append_optimistic(
            content,
            &self.identity.user_id,
            &self.identity.display_name,
            Utc::now(),
        )?;

        let Some(message) = self.log.get(&id) else {
            return Ok(id);
        };
        if let Err(e) = self.channel.send(message) {
            let reason = e.to_string();
            warn!(%id, error = %reason, "message emit failed");
            self.log.mark_failed(&id, &reason);
            return Err(ChatError::Send { id, reason });
        }

        debug!(%id, "message emitted");
        Ok(id)
    }

    /// Submit user input. Alias of [`ChatSession::append_optimistic`].
    ///
    /// # Errors
    ///
    /// See [`ChatSession::append_optimistic`].
    pub fn submit(&mut self, content: &str) -> Result<MessageId, ChatError> {
        self.append_optimistic(content)
    }

    /// Re-send the newest failed message from the local user as a fresh
    /// optimistic entry. The failed entry stays in the log.
    ///
    /// Returns `Ok(None)` when there is nothing to retry.
    ///
    /// # Errors
    ///
    /// See [`ChatSession::append_optimistic`].
    pub fn retry_last_failed(&mut self) -> Result<Option<MessageId>, ChatError> {
        let Some(content) = self
            .log
            .last_failed_from(&self.identity.user_id)
            .map(|m| m.content.clone())
        else {
            return Ok(None);
        };
        self.append_optimistic(&content).map(Some)
    }

    /// Tell peers the local user is typing. Failures are logged only.
    pub fn notify_typing(&self) {
        if let Err(e) = self.channel.notify_typing() {
            debug!(error = %e, "typing notification dropped");
        }
    }

    // -------------------------------------------------------------------------
    // Channel events
    // -------------------------------------------------------------------------

    /// Apply one inbound channel event.
    pub fn handle_event(&mut self, event: ChannelEvent) -> SessionUpdate {
        match event {
            ChannelEvent::Connected => {
                self.connected = true;
                SessionUpdate::Connected
            }
            ChannelEvent::Disconnected => {
                self.connected = false;
                SessionUpdate::Disconnected
            }
            ChannelEvent::NewMessage(incoming) => {
                let outcome = self.log.reconcile_incoming(incoming);
                debug!(?outcome, "message reconciled");
                SessionUpdate::Message(outcome)
            }
            ChannelEvent::MessageError { id, reason } => {
                let applied = self.log.mark_failed(&id, &reason);
                if applied {
                    warn!(%id, %reason, "message delivery failed");
                } else {
                    debug!(%id, "failure for unknown or settled message ignored");
                }
                SessionUpdate::SendFailed { id, applied }
            }
            ChannelEvent::Typing => {
                self.typing.on_typing(Instant::now());
                SessionUpdate::TypingStarted
            }
        }
    }

    /// Wait for the next channel event or the typing deadline, whichever is
    /// first, and apply it.
    ///
    /// Returns `None` once the subscription is closed.
    pub async fn step(&mut self, subscription: &mut Subscription) -> Option<SessionUpdate> {
        tokio::select! {
            event = subscription.recv() => event.map(|event| self.handle_event(event)),
            () = sleep_until_deadline(self.typing.deadline()) => {
                self.typing.expire(Instant::now());
                Some(SessionUpdate::TypingCleared)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Presentation
    // -------------------------------------------------------------------------

    /// Snapshot for rendering, grouped by local calendar day.
    #[must_use]
    pub fn view(&self) -> ChatView<'_> {
        self.view_in(&Local)
    }

    /// Snapshot for rendering, grouped by calendar day in `tz`.
    #[must_use]
    pub fn view_in<Tz: TimeZone>(&self, tz: &Tz) -> ChatView<'_> {
        ChatView {
            items: group_by_day(self.log.entries(), tz),
            connected: self.connected,
            typing: self.typing.is_active(),
            loading: self.loading,
            error: self.error.as_ref(),
            identity: &self.identity,
        }
    }
}

/// Read-only projection of a session.
#[derive(Debug)]
pub struct ChatView<'a> {
    pub items: Vec<DisplayItem<'a>>,
    pub connected: bool,
    pub typing: bool,
    pub loading: bool,
    pub error: Option<&'a ChatError>,
    pub identity: &'a Identity,
}

impl ChatView<'_> {
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        self.identity.owns(message)
    }
}
