//! Live channel seam.
//!
//! DESIGN
//! ======
//! A `LiveChannel` accepts outbound send/typing requests and fans inbound
//! events out to subscribers. Each `subscribe()` returns a `Subscription`
//! that deregisters itself when dropped, so whoever owns a session also owns
//! the lifetime of its listener. There is no process-wide channel; handles
//! are passed explicitly.

pub mod ws;

#[cfg(test)]
pub(crate) mod testing;


use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use frames::{Frame, event};
use tokio::sync::mpsc;

use crate::message::{Message, MessageId, ServerMessage, pick_id, pick_str};

// =============================================================================
// EVENTS
// =============================================================================

/// Inbound event delivered by a live channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    NewMessage(ServerMessage),
    MessageError { id: MessageId, reason: String },
    Typing,
}

impl ChannelEvent {
    /// Interpret a wire frame. Unknown events and malformed payloads yield
    /// `None`.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        match frame.event.as_str() {
            event::CONNECT => Some(Self::Connected),
            event::DISCONNECT => Some(Self::Disconnected),
            event::NEW_MESSAGE => ServerMessage::from_value(&frame.data).map(Self::NewMessage),
            event::MESSAGE_ERROR => {
                let id = pick_id(&frame.data, &["messageId", "id"])?;
                let reason = pick_str(&frame.data, &["error", "reason", "message"])
                    .unwrap_or("message failed")
                    .to_owned();
                Some(Self::MessageError { id, reason })
            }
            event::TYPING => Some(Self::Typing),
            _ => None,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("live channel is not connected")]
    NotConnected,
    #[error("live channel closed")]
    Closed,
}

// =============================================================================
// CHANNEL TRAIT
// =============================================================================

pub trait LiveChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Emit a send request for `message`.
    ///
    /// # Errors
    ///
    /// Fails when the channel cannot accept outbound frames.
    fn send(&self, message: &Message) -> Result<(), ChannelError>;

    /// Tell peers the local user is typing.
    ///
    /// # Errors
    ///
    /// Fails when the channel cannot accept outbound frames.
    fn notify_typing(&self) -> Result<(), ChannelError>;

    /// Register a listener for inbound events.
    fn subscribe(&self) -> Subscription;
}

// =============================================================================
// LISTENERS
// =============================================================================

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
}

/// Subscriber registry shared by channel implementations.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<ListenerSet>>,
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut set = lock(&self.inner);
        let id = set.next_id;
        set.next_id += 1;
        set.senders.insert(id, tx);
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber, dropping any whose receiver
    /// is gone.
    pub fn emit(&self, event: ChannelEvent) {
        let mut set = lock(&self.inner);
        set.senders.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).senders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered listener. Dropping it (or calling [`Subscription::unsubscribe`])
/// removes it from the channel.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    registry: Weak<Mutex<ListenerSet>>,
}

impl Subscription {
    /// Next event, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).senders.remove(&self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
