//! Plain-text rendering of a [`ChatView`] for the terminal client.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::fmt::Display;

use chrono::{NaiveDate, TimeZone};

use crate::grouping::{DisplayItem, day_label};
use crate::message::{DeliveryStatus, Message};
use crate::session::ChatView;

pub const TYPING_LINE: &str = "Someone is typing...";
pub const LOADING_LINE: &str = "Loading messages...";

/// Connection banner, e.g. `Alice · Online`.
#[must_use]
pub fn header(view: &ChatView<'_>) -> String {
    let state = if view.connected { "Online" } else { "Connecting..." };
    format!("{} · {state}", view.identity.display_name)
}

#[must_use]
pub fn separator(day: NaiveDate, today: NaiveDate) -> String {
    format!("──── {} ────", day_label(day, today))
}

/// One message line: `[HH:MM] name: content`, with the local user's
/// messages shown as `you` and a delivery marker while not yet sent.
#[must_use]
pub fn message_line<Tz>(message: &Message, own: bool, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = message.timestamp.with_timezone(tz).format("%H:%M");
    let name = if own { "you" } else { message.sender_name.as_str() };
    let marker = match message.status {
        DeliveryStatus::Sent => String::new(),
        DeliveryStatus::Sending => " (sending...)".to_owned(),
        DeliveryStatus::Error => match message.failure.as_deref() {
            Some(reason) => format!(" (failed: {reason})"),
            None => " (failed)".to_owned(),
        },
    };
    format!("[{time}] {name}: {}{marker}", message.content)
}

/// Full transcript for `view`: loading or error banner, then messages with
/// day separators, then the typing line when active.
#[must_use]
pub fn render_view<Tz>(view: &ChatView<'_>, tz: &Tz, today: NaiveDate) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = Vec::with_capacity(view.items.len() + 2);

    if let Some(error) = view.error {
        lines.push(format!("error: {error}"));
    }
    if view.loading {
        lines.push(LOADING_LINE.to_owned());
    }

    for item in &view.items {
        match item {
            DisplayItem::DaySeparator(day) => lines.push(separator(*day, today)),
            DisplayItem::Message(message) => lines.push(message_line(message, view.is_own(message), tz)),
        }
    }

    if view.typing {
        lines.push(TYPING_LINE.to_owned());
    }

    lines
}
