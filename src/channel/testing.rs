//! In-memory channel for exercising sessions without a socket.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{ChannelError, ChannelEvent, Listeners, LiveChannel, Subscription, lock};
use crate::message::Message;

#[derive(Default)]
pub(crate) struct RecordingChannel {
    listeners: Listeners,
    connected: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<Message>>,
    typing: AtomicUsize,
}

impl RecordingChannel {
    pub(crate) fn connected() -> Self {
        let channel = Self::default();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    /// Flip the connection flag and emit the matching lifecycle event.
    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.emit(if connected { ChannelEvent::Connected } else { ChannelEvent::Disconnected });
    }

    pub(crate) fn emit(&self, event: ChannelEvent) {
        self.listeners.emit(event);
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Message> {
        lock(&self.sent).clone()
    }

    pub(crate) fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl LiveChannel for RecordingChannel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, message: &Message) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        lock(&self.sent).push(message.clone());
        Ok(())
    }

    fn notify_typing(&self) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.listeners.subscribe()
    }
}
