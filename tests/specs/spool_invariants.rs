//! Cross-cutting invariants and boundary cases that don't belong to one scenario (§8).

use crate::prelude::*;
use ojb_bus::PidLock;
use ojb_spool::{list_spool_files, CallbackToken};
use ojb_transport::truncate;

/// Boundary case: a `schema.json` file sitting in a spool directory is never treated as a
/// record.
#[test]
fn schema_json_is_ignored_by_the_spool_listing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schema.json"), "{}").unwrap();
    std::fs::write(dir.path().join("summary_S1_WH.json"), "{}").unwrap();

    let files = list_spool_files(dir.path()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name().unwrap(), "summary_S1_WH.json");
}

/// Boundary case: truncation at exactly `max_chars` characters is a no-op — no ellipsis, no tag
/// closing.
#[test]
fn truncation_at_exact_length_is_unchanged() {
    let input = "**bold** text";
    let result = truncate(input, input.chars().count());
    assert_eq!(result.text, input);
    assert!(!result.truncated);
    assert!(result.tags_closed.is_empty());
}

/// Invariant 7: every emphasis/code run left open by a cut is closed in the emitted text.
#[test]
fn truncation_closes_every_run_left_open_by_the_cut() {
    let input = "start **bold and `code` stays open";
    let result = truncate(input, 10);
    assert!(result.truncated);
    // "start **bo" leaves "**" open; it must be closed before the ellipsis.
    assert!(result.tags_closed.contains(&"**"));
    assert!(result.text.ends_with("**\u{2026}"));
}

/// Boundary case: two processes racing to start Bus — exactly one acquires the PID lock.
#[test]
fn only_one_process_acquires_the_pid_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot.pid");

    let first = PidLock::acquire(&path).expect("first acquire succeeds");
    let second = PidLock::acquire(&path);
    assert!(second.is_err(), "a second concurrent acquire must fail");

    drop(first);
    assert!(!path.exists(), "releasing the lock removes bot.pid (invariant 5)");

    let third = PidLock::acquire(&path);
    assert!(third.is_ok(), "the lock is acquirable again once released");
}

/// Round-trip law: resolving a callback token within its TTL returns the exact context that
/// created it.
#[test]
fn callback_round_trips_within_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let map = ojb_bus::CallbackMap::new(dir.path(), std::time::Duration::from_secs(300), 1000);

    let ctx = CallbackToken {
        workspace_id: "WH".to_string(),
        workspace_path: "/w".to_string(),
        session_id: "S1".to_string(),
        action: "workflow_fix-links".to_string(),
        correlation_id: "C1".to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    };
    let token = map.create(&ctx).unwrap();
    let resolved = map.resolve(&token).unwrap();
    assert_eq!(resolved, ctx);
}

/// Round-trip law: writing then reading any spool record preserves all required fields.
#[test]
fn session_summary_round_trips_through_atomic_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary_S1_WH.json");
    let summary = s1_summary();
    ojb_spool::write_json_atomic(&path, &summary).unwrap();

    let read_back: ojb_spool::SessionSummary = ojb_spool::read_record(&path).unwrap().unwrap();
    assert_eq!(read_back, summary);
}
