//! Chat client core.
//!
//! A single-room chat client that shows messages the moment they are
//! submitted and reconciles them with server confirmations as they arrive.
//!
//! - [`message_log`]: the ordered log and its three mutations
//!   (optimistic append, confirmation reconcile, failure mark).
//! - [`grouping`]: date-separated display projection.
//! - [`typing`]: debounced typing indicator.
//! - [`channel`]: the live channel seam and its websocket adapter.
//! - [`history`]: one-shot history load over HTTP.
//! - [`session`]: the controller tying the above to one event loop.

pub mod channel;
pub mod config;
pub mod grouping;
pub mod history;
pub mod identity;
pub mod message;
pub mod message_log;
pub mod render;
pub mod session;
pub mod typing;
