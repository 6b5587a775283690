use super::*;
use chrono::TimeZone;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

fn confirmation(id: &str, temp_id: Option<&MessageId>, content: &str) -> ServerMessage {
    ServerMessage {
        id: MessageId::from(id),
        temp_id: temp_id.cloned(),
        content: content.to_owned(),
        sender: "u1".to_owned(),
        sender_name: "Alice".to_owned(),
        timestamp: ts(),
    }
}

fn statuses(log: &MessageLog) -> Vec<DeliveryStatus> {
    log.entries().iter().map(|m| m.status).collect()
}

// =============================================================
// append_optimistic
// =============================================================

#[test]
fn append_optimistic_adds_sending_entry() {
    let mut log = MessageLog::new();
    let id = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");

    assert_eq!(log.len(), 1);
    let entry = &log.entries()[0];
    assert_eq!(entry.id, id);
    assert!(id.is_temporary());
    assert_eq!(entry.content, "hi");
    assert_eq!(entry.status, DeliveryStatus::Sending);
    assert_eq!(entry.sender_name, "Alice");
    assert_eq!(entry.timestamp, ts());
}

#[test]
fn append_optimistic_trims_content() {
    let mut log = MessageLog::new();
    log.append_optimistic("  hello \n", "u1", "Alice", ts()).expect("append");
    assert_eq!(log.entries()[0].content, "hello");
}

#[test]
fn append_optimistic_rejects_blank_content() {
    let mut log = MessageLog::new();
    assert_eq!(log.append_optimistic("   ", "u1", "Alice", ts()), Err(LogError::EmptyContent));
    assert!(log.is_empty());
}

#[test]
fn append_optimistic_keeps_insertion_order_over_timestamps() {
    let mut log = MessageLog::new();
    let later = ts() + chrono::Duration::hours(1);
    log.append_optimistic("first", "u1", "Alice", later).expect("append");
    log.append_optimistic("second", "u1", "Alice", ts()).expect("append");
    let contents: Vec<_> = log.entries().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["first", "second"]);
}

// =============================================================
// reconcile_incoming
// =============================================================

#[test]
fn confirmation_for_temp_id_replaces_in_place() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert_eq!(outcome, Reconciliation::Replaced(0));
    assert_eq!(log.len(), 1);
    let entry = &log.entries()[0];
    assert_eq!(entry.id.as_str(), "42");
    assert_eq!(entry.content, "hi");
    assert_eq!(entry.status, DeliveryStatus::Sent);
    assert!(log.get(&temp).is_none());
}

#[test]
fn confirmation_preserves_position_among_other_entries() {
    let mut log = MessageLog::new();
    log.append_optimistic("a", "u1", "Alice", ts()).expect("append");
    let temp = log.append_optimistic("b", "u1", "Alice", ts()).expect("append");
    log.append_optimistic("c", "u1", "Alice", ts()).expect("append");

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "b"));

    assert_eq!(outcome, Reconciliation::Replaced(1));
    assert_eq!(log.entries()[1].id.as_str(), "42");
    assert_eq!(
        statuses(&log),
        [DeliveryStatus::Sending, DeliveryStatus::Sent, DeliveryStatus::Sending]
    );
}

#[test]
fn unmatched_confirmation_is_appended_as_sent() {
    let mut log = MessageLog::new();
    log.append_optimistic("mine", "u1", "Alice", ts()).expect("append");

    let outcome = log.reconcile_incoming(confirmation("99", None, "from someone else"));

    assert_eq!(outcome, Reconciliation::Appended(1));
    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[1].id.as_str(), "99");
    assert_eq!(log.entries()[1].status, DeliveryStatus::Sent);
}

#[test]
fn redelivered_confirmation_is_a_no_op() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));
    let before = log.entries().to_vec();

    let outcome = log.reconcile_incoming(confirmation("42", None, "hi"));

    assert_eq!(outcome, Reconciliation::Duplicate(0));
    assert_eq!(log.entries(), before.as_slice());
}

#[test]
fn redelivery_with_stale_temp_id_is_still_a_no_op() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert_eq!(outcome, Reconciliation::Duplicate(0));
    assert_eq!(log.len(), 1);
}

#[test]
fn confirmation_already_in_history_absorbs_optimistic_entry() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    log.seed_history(vec![confirmation("42", None, "hi")]);
    assert_eq!(log.len(), 2);

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert_eq!(outcome, Reconciliation::Merged(0));
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].id.as_str(), "42");
    assert_eq!(log.entries()[0].status, DeliveryStatus::Sent);
    assert!(log.get(&temp).is_none());
}

#[test]
fn merged_confirmation_keeps_index_of_later_existing_entry() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    log.append_optimistic("other", "u1", "Alice", ts()).expect("append");
    log.reconcile_incoming(confirmation("42", None, "hi"));

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert_eq!(outcome, Reconciliation::Merged(1));
    let contents: Vec<_> = log.entries().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["other", "hi"]);
}

#[test]
fn late_confirmation_overrides_failure() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    assert!(log.mark_failed(&temp, "network error"));

    let outcome = log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert_eq!(outcome, Reconciliation::Replaced(0));
    assert_eq!(log.entries()[0].status, DeliveryStatus::Sent);
    assert_eq!(log.entries()[0].failure, None);
}

// =============================================================
// mark_failed
// =============================================================

#[test]
fn mark_failed_sets_error_and_reason() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");

    assert!(log.mark_failed(&temp, "network error"));

    let entry = log.get(&temp).expect("entry");
    assert_eq!(entry.status, DeliveryStatus::Error);
    assert_eq!(entry.failure.as_deref(), Some("network error"));
}

#[test]
fn mark_failed_on_unknown_id_does_not_mutate() {
    let mut log = MessageLog::new();
    log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    let before = log.entries().to_vec();

    assert!(!log.mark_failed(&MessageId::from("nope"), "boom"));
    assert_eq!(log.entries(), before.as_slice());
}

#[test]
fn mark_failed_leaves_terminal_entries_alone() {
    let mut log = MessageLog::new();
    let temp = log.append_optimistic("hi", "u1", "Alice", ts()).expect("append");
    log.reconcile_incoming(confirmation("42", Some(&temp), "hi"));

    assert!(!log.mark_failed(&MessageId::from("42"), "late failure"));
    assert_eq!(log.entries()[0].status, DeliveryStatus::Sent);

    let other = log.append_optimistic("again", "u1", "Alice", ts()).expect("append");
    assert!(log.mark_failed(&other, "first"));
    assert!(!log.mark_failed(&other, "second"));
    assert_eq!(log.get(&other).and_then(|m| m.failure.as_deref()), Some("first"));
}

// =============================================================
// seed_history / last_failed_from
// =============================================================

#[test]
fn seed_history_goes_before_live_entries_and_skips_known_ids() {
    let mut log = MessageLog::new();
    log.reconcile_incoming(confirmation("2", None, "live"));
    log.append_optimistic("pending", "u1", "Alice", ts()).expect("append");

    let inserted = log.seed_history(vec![
        confirmation("1", None, "old"),
        confirmation("2", None, "live"),
        confirmation("1", None, "old again"),
    ]);

    assert_eq!(inserted, 1);
    let contents: Vec<_> = log.entries().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["old", "live", "pending"]);
}

#[test]
fn reload_slots_new_rows_after_known_history() {
    let mut log = MessageLog::new();
    log.seed_history(vec![confirmation("1", None, "one"), confirmation("2", None, "two")]);

    let inserted = log.seed_history(vec![
        confirmation("1", None, "one"),
        confirmation("2", None, "two"),
        confirmation("3", None, "three"),
    ]);

    assert_eq!(inserted, 1);
    let contents: Vec<_> = log.entries().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "three"]);
}

#[test]
fn reload_keeps_pending_entries_after_history() {
    let mut log = MessageLog::new();
    log.seed_history(vec![confirmation("1", None, "one")]);
    log.append_optimistic("pending", "u1", "Alice", ts()).expect("append");

    log.seed_history(vec![confirmation("1", None, "one"), confirmation("2", None, "two")]);

    let contents: Vec<_> = log.entries().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "pending"]);
}

#[test]
fn last_failed_from_returns_newest_failure_for_sender() {
    let mut log = MessageLog::new();
    let a = log.append_optimistic("a", "u1", "Alice", ts()).expect("append");
    let b = log.append_optimistic("b", "u1", "Alice", ts()).expect("append");
    log.append_optimistic("c", "u2", "Bob", ts()).expect("append");
    log.mark_failed(&a, "x");
    log.mark_failed(&b, "y");

    assert_eq!(log.last_failed_from("u1").map(|m| m.content.as_str()), Some("b"));
    assert!(log.last_failed_from("u2").is_none());
}
