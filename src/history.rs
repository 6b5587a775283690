//! Message history from the content API.
//!
//! DESIGN
//! ======
//! History is a one-shot load at session start. The content API returns
//! pages shaped `{ "data": [...], "meta": { "pagination": {...} } }`; pages
//! are followed until `pageCount` is reached. Rows may be flat or wrap their
//! fields in `attributes`.
//!
//! ERROR HANDLING
//! ==============
//! Transport and status failures abort the load and are surfaced once to the
//! caller; no retry happens here. Individual rows that fail to parse are
//! skipped with a warning.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::message::ServerMessage;

/// Rows requested per page.
pub const HISTORY_PAGE_SIZE: u32 = 100;
/// Upper bound on pages followed in one load.
pub const HISTORY_MAX_PAGES: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("history request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("history payload invalid: {0}")]
    Payload(String),
}

/// One-shot source of the ordered message history.
#[async_trait::async_trait]
pub trait HistoryFetcher: Send + Sync {
    /// Fetch every stored message, ascending by timestamp.
    async fn fetch_history(&self) -> Result<Vec<ServerMessage>, HistoryError>;
}

// =============================================================================
// HTTP FETCHER
// =============================================================================

pub struct HttpHistory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistory {
    /// Build a fetcher for the content API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HistoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn page_url(&self, page: u32) -> String {
        format!(
            "{}/api/messages?sort=timestamp:asc&pagination[page]={page}&pagination[pageSize]={HISTORY_PAGE_SIZE}",
            self.base_url
        )
    }

    async fn fetch_page(&self, page: u32) -> Result<Value, HistoryError> {
        let response = self.client.get(self.page_url(page)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HistoryError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait::async_trait]
impl HistoryFetcher for HttpHistory {
    async fn fetch_history(&self) -> Result<Vec<ServerMessage>, HistoryError> {
        let mut messages = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(page).await?;
            let parsed = parse_history_page(&body)?;
            debug!(page, rows = parsed.messages.len(), "history page loaded");
            messages.extend(parsed.messages);

            let page_count = parsed.page_count.unwrap_or(page);
            if page >= page_count {
                break;
            }
            if page >= HISTORY_MAX_PAGES {
                warn!(page_count, "history truncated at page limit");
                break;
            }
            page += 1;
        }

        Ok(messages)
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug, Default)]
pub struct HistoryPage {
    pub messages: Vec<ServerMessage>,
    /// `meta.pagination.pageCount`, when the API reports it.
    pub page_count: Option<u32>,
}

/// Parse one page of the content API response.
///
/// # Errors
///
/// Returns [`HistoryError::Payload`] when `data` is missing or not an array.
pub fn parse_history_page(body: &Value) -> Result<HistoryPage, HistoryError> {
    let rows = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| HistoryError::Payload("missing `data` array".to_owned()))?;

    let messages = rows
        .iter()
        .filter_map(|row| {
            let parsed = ServerMessage::from_value(&flatten_row(row));
            if parsed.is_none() {
                warn!(%row, "skipping unparseable history row");
            }
            parsed
        })
        .collect();

    let page_count = body
        .pointer("/meta/pagination/pageCount")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok());

    Ok(HistoryPage { messages, page_count })
}

/// Lift `attributes` fields to the top level, keeping the row id.
fn flatten_row(row: &Value) -> Value {
    let Some(attributes) = row.get("attributes").and_then(Value::as_object) else {
        return row.clone();
    };
    let mut flat = attributes.clone();
    if let Some(id) = row.get("id") {
        flat.entry("id").or_insert_with(|| id.clone());
    }
    Value::Object(flat)
}
