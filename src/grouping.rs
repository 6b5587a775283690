//! Date-separated display projection over the message log.
//!
//! The projection is pure: it borrows the log, never reorders it and keeps no
//! separator state of its own, so it can be re-derived on every render.

#[cfg(test)]
#[path = "grouping_test.rs"]
mod grouping_test;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::message::Message;

/// One row of the rendered message list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DisplayItem<'a> {
    /// Marks the start of a new calendar day.
    DaySeparator(NaiveDate),
    Message(&'a Message),
}

/// Calendar day of `ts` in time zone `tz`.
#[must_use]
pub fn calendar_day<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Walk `messages` in order and insert a separator before every entry whose
/// calendar day differs from the previous entry's.
///
/// The first entry gets no separator; N consecutive distinct days produce
/// N - 1 separators.
#[must_use]
pub fn group_by_day<'a, Tz: TimeZone>(messages: &'a [Message], tz: &Tz) -> Vec<DisplayItem<'a>> {
    let mut items = Vec::with_capacity(messages.len());
    let mut previous: Option<NaiveDate> = None;

    for message in messages {
        let day = calendar_day(&message.timestamp, tz);
        if previous.is_some_and(|prev| prev != day) {
            items.push(DisplayItem::DaySeparator(day));
        }
        previous = Some(day);
        items.push(DisplayItem::Message(message));
    }

    items
}

/// Human label for a separator: `Today`, `Yesterday`, or a long date such as
/// `Monday, March 3, 2025`.
#[must_use]
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        return "Today".to_owned();
    }
    if today.pred_opt() == Some(day) {
        return "Yesterday".to_owned();
    }
    day.format("%A, %B %-d, %Y").to_string()
}
