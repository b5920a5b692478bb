//! Bus-side scenarios: menu posting, workflow selection, restart recovery, dedup, and callback
//! expiry (§8 S1, S4, S5, S6).

use crate::prelude::*;
use ojb_bus::{Config, TrackingKey};
use ojb_core::FakeClock;
use ojb_registry::{WorkflowRegistry, WorkspaceRegistry};
use ojb_spool::{CallbackToken, ProgressSnapshot, ProgressStatus, Stage};
use ojb_transport::{CallbackEvent, FakeTransport, RecordedCall};

/// S1: a summary with broken links and modified files produces a two-button menu (`fix-links`,
/// `commit`) — `always-on` fires too, so the menu lists all three workflows that are eligible.
#[tokio::test]
async fn s1_menu_lists_every_workflow_whose_trigger_fires() {
    let h = Harness::new();
    h.write_summary(&s1_summary());

    h.bus.scan_summaries().await;

    let calls = h.bus.adapter.transport().calls();
    assert_eq!(calls.len(), 1, "exactly one menu message posted");
    let RecordedCall::Send { text, keyboard, .. } = &calls[0] else { panic!("expected a send call") };
    assert!(text.contains("3"), "menu text should mention the lychee error count");
    let keyboard = keyboard.as_ref().expect("menu carries an inline keyboard");
    let labels: Vec<&str> = keyboard.rows.iter().flatten().map(|b| b.label.as_str()).collect();
    assert!(labels.iter().any(|l| l.contains("Fix broken links")));
    assert!(labels.iter().any(|l| l.contains("Commit changes")));
    assert!(labels.iter().any(|l| l.contains("Housekeeping")));

    // Summary file is unlinked and cached under (workspace, session).
    assert!(!h.config.summaries_dir().join("summary_S1_WH.json").exists());
    assert!(h.bus.summaries.lock().contains_key(&("WH".to_string(), "S1".to_string())));
}

/// Boundary case (§8): zero lychee errors and zero modified files means only `always`-triggered
/// workflows appear.
#[tokio::test]
async fn boundary_zero_triggers_leaves_only_always_on() {
    let h = Harness::new();
    h.write_summary(&quiet_summary("WQ", "SQ"));

    h.bus.scan_summaries().await;

    let calls = h.bus.adapter.transport().calls();
    let RecordedCall::Send { keyboard, .. } = &calls[0] else { panic!("expected a send call") };
    let labels: Vec<&str> = keyboard.as_ref().unwrap().rows.iter().flatten().map(|b| b.label.as_str()).collect();
    assert_eq!(labels.iter().filter(|l| !l.contains("details") && !l.contains("Custom")).count(), 1);
    assert!(labels.iter().any(|l| l.contains("Housekeeping")));
}

/// S1 continued: pressing `fix-links` writes the selection file, deletes the menu, posts a
/// tracking message, and records a tracking entry carrying the posted message id.
#[tokio::test]
async fn s1_workflow_selection_writes_spool_files_and_tracking() {
    let h = Harness::new();
    h.write_summary(&s1_summary());
    h.bus.scan_summaries().await;

    let ctx = CallbackToken {
        workspace_id: "WH".to_string(),
        workspace_path: "/w".to_string(),
        session_id: "S1".to_string(),
        action: "workflow_fix-links".to_string(),
        correlation_id: "C1".to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    };
    let token = h.bus.callbacks.create(&ctx).expect("create callback token");
    let event = CallbackEvent {
        callback_token: token,
        chat_id: CHAT_ID.to_string(),
        message_id: "1".to_string(),
        from_user: "u1".to_string(),
    };

    h.bus.handle_callback(event).await;

    let selection_path = h.config.selections_dir().join("selection_S1_WH.json");
    assert!(selection_path.exists(), "selection file should be written");
    let selection: ojb_spool::WorkflowSelection =
        serde_json::from_str(&std::fs::read_to_string(&selection_path).unwrap()).unwrap();
    assert_eq!(selection.workflows, vec!["fix-links".to_string()]);
    assert!(selection.summary_data.is_some());

    let calls = h.bus.adapter.transport().calls();
    assert!(calls.iter().any(|c| matches!(c, RecordedCall::Delete { .. })), "menu message deleted");
    assert!(calls.iter().any(|c| matches!(c, RecordedCall::Send { text, .. } if text.contains("Fix broken links"))));

    let key = TrackingKey::new("WH", "S1", "fix-links");
    assert!(h.bus.tracking.get(&key).is_some(), "tracking record recorded in memory");
    assert!(h.config.tracking_dir().join("WH_S1_fix-links_tracking.json").exists());
}

/// S4: Bus restarts mid-flight. The tracking record written before "crash" survives on disk and
/// is repopulated into the in-memory map at startup, so subsequent progress edits the same
/// message.
#[tokio::test]
async fn s4_restart_recovers_tracking_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        state_dir: tmp.path().to_path_buf(),
        chat_token: Some("t".to_string()),
        chat_id: Some(CHAT_ID.to_string()),
        correlation_id: None,
        idle_timeout: std::time::Duration::from_secs(1800),
    };
    ojb_bus::config::ensure_state_dirs(&config).unwrap();
    std::fs::write(config.workflow_registry_path(), SAMPLE_REGISTRY_JSON).unwrap();
    std::fs::write(config.workspace_registry_path(), EMPTY_WORKSPACE_REGISTRY_JSON).unwrap();

    let record = ojb_spool::TrackingRecord {
        message_id: "42".to_string(),
        workspace_id: "WH".to_string(),
        repository_root: "/w".to_string(),
        working_directory: "/w".to_string(),
        git_branch: "main".to_string(),
        git_modified: 2,
        git_staged: 0,
        git_untracked: 0,
        workflow_name: "Fix broken links".to_string(),
        session_id: "S1".to_string(),
        user_prompt: None,
        last_response: None,
    };
    ojb_spool::write_json_atomic(config.tracking_dir().join("WH_S1_fix-links_tracking.json"), &record).unwrap();

    let workflow_registry = WorkflowRegistry::load(&config.workflow_registry_path()).unwrap();
    let workspace_registry = WorkspaceRegistry::load(&config.workspace_registry_path()).unwrap();
    let bus = ojb_bus::Bus::new(config.clone(), workflow_registry, workspace_registry, FakeTransport::new(), FakeClock::new());

    bus.drain_at_startup().await;

    let key = TrackingKey::new("WH", "S1", "fix-links");
    assert_eq!(bus.tracking.get(&key).map(|r| r.message_id), Some("42".to_string()));

    // A progress snapshot for the recovered workflow edits message "42", not a new message.
    let snapshot = ProgressSnapshot {
        workspace_id: "WH".to_string(),
        session_id: "S1".to_string(),
        workflow_id: "fix-links".to_string(),
        status: ProgressStatus::Running,
        stage: Stage::Executing,
        progress_percent: 50,
        message: "executing".to_string(),
        timestamp: "2026-01-01T00:01:00Z".to_string(),
    };
    ojb_spool::write_json_atomic(config.progress_dir().join("WH_S1_fix-links.json"), &snapshot).unwrap();
    bus.scan_progress().await;

    let calls = bus.adapter.transport().calls();
    assert!(calls.iter().any(|c| matches!(c, RecordedCall::Edit { message_id, .. } if message_id == "42")));
}

/// S5: two progress snapshots with identical rendered text result in exactly one transport edit.
#[tokio::test]
async fn s5_duplicate_progress_text_is_suppressed() {
    let h = Harness::new();
    let key = TrackingKey::new("WH", "S1", "fix-links");
    h.bus
        .tracking
        .insert(
            key,
            ojb_spool::TrackingRecord {
                message_id: "7".to_string(),
                workspace_id: "WH".to_string(),
                repository_root: "/w".to_string(),
                working_directory: "/w".to_string(),
                git_branch: "main".to_string(),
                git_modified: 2,
                git_staged: 0,
                git_untracked: 0,
                workflow_name: "Fix broken links".to_string(),
                session_id: "S1".to_string(),
                user_prompt: None,
                last_response: None,
            },
        )
        .unwrap();

    let snapshot = ProgressSnapshot {
        workspace_id: "WH".to_string(),
        session_id: "S1".to_string(),
        workflow_id: "fix-links".to_string(),
        status: ProgressStatus::Running,
        stage: Stage::Executing,
        progress_percent: 50,
        message: "executing".to_string(),
        timestamp: "2026-01-01T00:01:00Z".to_string(),
    };
    let path = h.config.progress_dir().join("WH_S1_fix-links.json");
    ojb_spool::write_json_atomic(&path, &snapshot).unwrap();
    h.bus.scan_progress().await;

    // Same stage, same percent, same message: re-write (simulating a second identical snapshot).
    ojb_spool::write_json_atomic(&path, &snapshot).unwrap();
    h.bus.scan_progress().await;

    let edits = h.bus.adapter.transport().calls().into_iter().filter(|c| matches!(c, RecordedCall::Edit { .. })).count();
    assert_eq!(edits, 1, "only the first identical snapshot should produce a transport edit");
}

/// S6: a callback pressed after the TTL has elapsed is reported as expired and the stored
/// context is removed regardless.
#[tokio::test]
async fn s6_expired_callback_is_reported_and_cleaned_up() {
    let h = Harness::new();
    let ctx = CallbackToken {
        workspace_id: "WH".to_string(),
        workspace_path: "/w".to_string(),
        session_id: "S1".to_string(),
        action: "workflow_fix-links".to_string(),
        correlation_id: "C1".to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    };
    let token = h.bus.callbacks.create(&ctx).expect("create callback token");

    // Backdate the callback file past the 5-minute TTL.
    let path = h.config.callbacks_dir().join(format!("{token}.json"));
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(6 * 60);
    filetime_backdate(&path, old);

    let event = CallbackEvent {
        callback_token: token,
        chat_id: CHAT_ID.to_string(),
        message_id: "1".to_string(),
        from_user: "u1".to_string(),
    };
    h.bus.handle_callback(event).await;

    let calls = h.bus.adapter.transport().calls();
    assert!(calls.iter().any(|c| matches!(c, RecordedCall::Edit { text, .. } if text.contains("expired"))));
    assert!(!path.exists(), "expired callback file is removed on read");
}

/// Sets a file's mtime into the past without pulling in a filetime crate: reopen for write with
/// the same content, then hand-roll via `utime`-equivalent through `std::fs::File::set_times`.
fn filetime_backdate(path: &std::path::Path, when: std::time::SystemTime) {
    let file = std::fs::OpenOptions::new().write(true).open(path).expect("open for backdate");
    let times = std::fs::FileTimes::new().set_modified(when).set_accessed(when);
    file.set_times(times).expect("set_times");
}
