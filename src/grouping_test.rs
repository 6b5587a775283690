use super::*;
use chrono::{FixedOffset, TimeZone};

use crate::message::{DeliveryStatus, MessageId};

fn msg(id: &str, ts: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::from(id),
        content: id.to_owned(),
        sender: "u1".to_owned(),
        sender_name: "Alice".to_owned(),
        timestamp: ts,
        status: DeliveryStatus::Sent,
        failure: None,
    }
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

#[test]
fn three_days_yield_two_separators_before_second_and_third_day() {
    let messages = vec![
        msg("a", at(1, 9)),
        msg("b", at(1, 18)),
        msg("c", at(2, 9)),
        msg("d", at(3, 9)),
        msg("e", at(3, 10)),
    ];

    let items = group_by_day(&messages, &Utc);

    assert_eq!(
        items,
        vec![
            DisplayItem::Message(&messages[0]),
            DisplayItem::Message(&messages[1]),
            DisplayItem::DaySeparator(date(2)),
            DisplayItem::Message(&messages[2]),
            DisplayItem::DaySeparator(date(3)),
            DisplayItem::Message(&messages[3]),
            DisplayItem::Message(&messages[4]),
        ]
    );
}

#[test]
fn empty_log_projects_to_nothing() {
    assert!(group_by_day(&Vec::<Message>::new(), &Utc).is_empty());
}

#[test]
fn projection_does_not_reorder_out_of_order_timestamps() {
    let messages = vec![msg("late", at(2, 9)), msg("early", at(1, 9))];

    let items = group_by_day(&messages, &Utc);

    assert_eq!(
        items,
        vec![
            DisplayItem::Message(&messages[0]),
            DisplayItem::DaySeparator(date(1)),
            DisplayItem::Message(&messages[1]),
        ]
    );
}

#[test]
fn day_boundary_follows_the_given_time_zone() {
    // 23:30 UTC on the 1st is already the 2nd at UTC+2.
    let messages = vec![msg("a", at(1, 20)), msg("b", Utc.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap())];
    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

    assert_eq!(group_by_day(&messages, &Utc).len(), 2);
    let shifted = group_by_day(&messages, &plus_two);
    assert_eq!(shifted.len(), 3);
    assert_eq!(shifted[1], DisplayItem::DaySeparator(date(2)));
}

#[test]
fn day_label_names_today_and_yesterday() {
    let today = date(3);
    assert_eq!(day_label(date(3), today), "Today");
    assert_eq!(day_label(date(2), today), "Yesterday");
}

#[test]
fn day_label_uses_long_date_for_older_days() {
    assert_eq!(day_label(date(1), date(3)), "Saturday, March 1, 2025");
}
