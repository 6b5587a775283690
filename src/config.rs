//! Client configuration parsed from environment variables.
//!
//! Endpoint and identity settings come from CLI flags with env fallbacks
//! (see `main.rs`). The tuning knobs here are plain env vars with defaults;
//! unparseable values fall back to the default.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::channel::ws::{
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, DEFAULT_RECONNECT_MAX_DELAY, ReconnectPolicy,
};
use crate::typing::DEFAULT_TYPING_DECAY;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";
pub const DEFAULT_HISTORY_TIMEOUT_SECS: u64 = 10;
/// Path of the live socket relative to the base URL.
pub const SOCKET_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTuning {
    pub typing_decay: Duration,
    pub reconnect: ReconnectPolicy,
    pub history_timeout: Duration,
}

impl Default for ChatTuning {
    fn default() -> Self {
        Self {
            typing_decay: DEFAULT_TYPING_DECAY,
            reconnect: ReconnectPolicy::default(),
            history_timeout: Duration::from_secs(DEFAULT_HISTORY_TIMEOUT_SECS),
        }
    }
}

impl ChatTuning {
    /// Build tuning from environment variables.
    ///
    /// Optional:
    /// - `CHAT_TYPING_DECAY_MS`: default 2000
    /// - `CHAT_RECONNECT_ATTEMPTS`: default 5
    /// - `CHAT_RECONNECT_DELAY_MS`: default 1000
    /// - `CHAT_RECONNECT_MAX_DELAY_MS`: default 10000
    /// - `CHAT_HISTORY_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build tuning from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(lookup_parse(&lookup, key, duration_millis(default)))
        };

        let base_delay = millis("CHAT_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY);
        let max_delay = millis("CHAT_RECONNECT_MAX_DELAY_MS", DEFAULT_RECONNECT_MAX_DELAY).max(base_delay);

        Self {
            typing_decay: millis("CHAT_TYPING_DECAY_MS", DEFAULT_TYPING_DECAY),
            reconnect: ReconnectPolicy {
                max_attempts: lookup_parse(&lookup, "CHAT_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS),
                base_delay,
                max_delay,
            },
            history_timeout: Duration::from_secs(lookup_parse(
                &lookup,
                "CHAT_HISTORY_TIMEOUT_SECS",
                DEFAULT_HISTORY_TIMEOUT_SECS,
            )),
        }
    }
}

fn lookup_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Derive the live socket URL from the HTTP base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] unless `base_url` is `http://` or
/// `https://`.
pub fn socket_url(base_url: &str) -> Result<String, ConfigError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{SOCKET_PATH}"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{SOCKET_PATH}"));
    }

    Err(ConfigError::InvalidBaseUrl(base_url.to_owned()))
}
