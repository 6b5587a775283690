//! Websocket live channel.
//!
//! `WsChannel` owns one background task per `connect()`. The task dials the
//! socket, forwards outbound frames queued by `send`/`notify_typing`, decodes
//! inbound frames into `ChannelEvent`s, and redials with capped exponential
//! backoff when the socket drops.
//!
//! ERROR HANDLING
//! ==============
//! Dial, read and write failures are logged and end the current connection;
//! subscribers only ever see `Connected` / `Disconnected` transitions.
//! Undecodable frames are dropped with a warning.

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use frames::{Frame, encode_frame, event};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{ChannelError, ChannelEvent, Listeners, LiveChannel, Subscription, lock};
use crate::message::Message;

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

/// How the channel redials after a dropped or failed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), doubling from
    /// `base_delay` and capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << shift)
            .min(self.max_delay)
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

#[derive(Default)]
struct Shared {
    listeners: Listeners,
    connected: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    fn push(&self, frame: &Frame) -> Result<(), ChannelError> {
        let outbound = lock(&self.outbound);
        let Some(tx) = outbound.as_ref() else {
            return Err(ChannelError::NotConnected);
        };
        tx.send(encode_frame(frame)).map_err(|_| ChannelError::Closed)
    }

    fn go_online(&self, tx: mpsc::UnboundedSender<String>) {
        *lock(&self.outbound) = Some(tx);
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.listeners.emit(ChannelEvent::Connected);
        }
    }

    fn go_offline(&self) {
        *lock(&self.outbound) = None;
        if self.connected.swap(false, Ordering::SeqCst) {
            self.listeners.emit(ChannelEvent::Disconnected);
        }
    }
}

// =============================================================================
// CHANNEL
// =============================================================================

pub struct WsChannel {
    url: String,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsChannel {
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
            shared: Arc::new(Shared::default()),
            task: Mutex::new(None),
        }
    }

    /// Start the connection task. A no-op while one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let url = self.url.clone();
        let policy = self.policy;
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(run_lifecycle(url, policy, shared)));
    }

    /// Stop the connection task and drop the socket.
    pub fn disconnect(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        self.shared.go_offline();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

impl LiveChannel for WsChannel {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.shared
            .push(&Frame::new(event::MESSAGE, message.send_payload()))
    }

    fn notify_typing(&self) -> Result<(), ChannelError> {
        self.shared.push(&Frame::bare(event::TYPING))
    }

    fn subscribe(&self) -> Subscription {
        self.shared.listeners.subscribe()
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

async fn run_lifecycle(url: String, policy: ReconnectPolicy, shared: Arc<Shared>) {
    let mut failures: u32 = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                failures = 0;
                info!(%url, "live channel connected");
                run_connection(stream, &shared).await;
                shared.go_offline();
                info!(%url, "live channel disconnected");
            }
            Err(e) => {
                warn!(error = %e, %url, "live channel dial failed");
            }
        }

        failures = failures.saturating_add(1);
        if failures > policy.max_attempts {
            warn!(attempts = policy.max_attempts, %url, "live channel giving up on reconnect");
            return;
        }
        let delay = policy.delay_for(failures);
        debug!(attempt = failures, ?delay, "live channel redial scheduled");
        tokio::time::sleep(delay).await;
    }
}

async fn run_connection<S>(stream: tokio_tungstenite::WebSocketStream<S>, shared: &Shared)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    shared.go_online(tx);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(text) = outbound else {
                    break;
                };
                if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                    warn!(error = %e, "live channel write failed");
                    break;
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !dispatch_text(text.as_str(), shared) {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            if !dispatch_text(text, shared) {
                                break;
                            }
                        }
                        Err(_) => debug!(len = bytes.len(), "ignoring non-utf8 binary frame"),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "live channel read failed");
                        break;
                    }
                }
            }
        }
    }

    let _ = write.close().await;
}

/// Decode one inbound text frame and fan it out.
///
/// Returns `false` when the server asked to end the session.
fn dispatch_text(text: &str, shared: &Shared) -> bool {
    let frame = match frames::decode_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            return true;
        }
    };

    match ChannelEvent::from_frame(&frame) {
        Some(ChannelEvent::Disconnected) => false,
        // Connection state follows the socket itself.
        Some(ChannelEvent::Connected) => true,
        Some(event) => {
            shared.listeners.emit(event);
            true
        }
        None => {
            debug!(event = %frame.event, "ignoring unhandled frame");
            true
        }
    }
}
