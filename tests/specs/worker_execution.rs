//! Worker-side scenarios: the progress/execution state machine and the timeout path (§8 S2, S3).

use crate::prelude::*;
use ojb_eventlog::EventLog;
use ojb_registry::WorkflowRegistry;
use ojb_spool::{read_record, ExecutionStatus, ProgressSnapshot, Stage, WorkflowSelection};
use ojb_worker::Config;
use std::time::Duration;

fn worker_config(state_dir: std::path::PathBuf, claude_cli_bin: String, timeout: Duration) -> Config {
    Config { state_dir, correlation_id: Some("C1".to_string()), claude_cli_timeout: timeout, claude_cli_bin }
}

fn selection_for(summary: &ojb_spool::SessionSummary, workflow_id: &str) -> WorkflowSelection {
    WorkflowSelection {
        workspace_path: summary.workspace_path.clone(),
        workspace_id: summary.workspace_id.clone(),
        session_id: summary.session_id.clone(),
        workflows: vec![workflow_id.to_string()],
        correlation_id: summary.correlation_id.clone(),
        timestamp: "2026-01-01T00:00:10Z".to_string(),
        summary_data: Some(summary.clone()),
        metadata: serde_json::Value::Null,
    }
}

fn progress_path(config: &Config, summary: &ojb_spool::SessionSummary, workflow_id: &str) -> std::path::PathBuf {
    config.progress_dir().join(format!("{}_{}_{}.json", summary.workspace_id, summary.session_id, workflow_id))
}

fn execution_path(config: &Config, summary: &ojb_spool::SessionSummary, workflow_id: &str) -> std::path::PathBuf {
    config.executions_dir().join(format!("execution_{}_{}_{}.json", summary.session_id, summary.workspace_id, workflow_id))
}

/// S2: a successful run leaves a `completed`/`success` progress snapshot and a matching
/// execution record whose human summary is pulled out of the assistant's JSON `result` field.
#[tokio::test]
async fn s2_successful_run_records_completed_progress_and_execution() {
    let tmp = tempfile::tempdir().unwrap();
    for dir in ["progress", "executions", "summaries", "selections"] {
        std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    let claude = fake_claude_script(tmp.path(), Some(r#"{"result":"Fixed 3 links"}"#));
    let config = worker_config(tmp.path().to_path_buf(), claude.to_string_lossy().to_string(), Duration::from_secs(5));

    std::fs::write(tmp.path().join("workflows.json"), SAMPLE_REGISTRY_JSON).unwrap();
    let registry = WorkflowRegistry::load(&config.workflow_registry_path()).unwrap();
    let event_log = EventLog::new(config.event_log_path());

    let mut summary = s1_summary();
    summary.workspace_path = tmp.path().to_string_lossy().to_string();
    let selection = selection_for(&summary, "fix-links");

    ojb_worker::run_selection(&config, &registry, &selection, &event_log).await.unwrap();

    let progress: ProgressSnapshot = read_record(&progress_path(&config, &summary, "fix-links")).unwrap().unwrap();
    assert_eq!(progress.stage, Stage::Completed);
    assert_eq!(progress.progress_percent, 100);
    assert!(progress.message.contains("Fixed 3 links"));

    let execution: ojb_spool::WorkflowExecution = read_record(&execution_path(&config, &summary, "fix-links")).unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.exit_code, 0);

    let events = event_log.read_all().unwrap();
    assert!(events.iter().any(|e| e.event_type == "orchestrator.completed"));

    // Anti-feedback marker is gone once the invocation has returned.
    assert!(!config.anti_feedback_marker_path().exists());
}

/// S3: a subprocess that outlives its timeout is killed; the execution is recorded as `timeout`
/// with exit_code -1 and a message naming the bound, and the progress snapshot ends in `error`.
#[tokio::test]
async fn s3_timeout_kills_subprocess_and_records_timeout_execution() {
    let tmp = tempfile::tempdir().unwrap();
    for dir in ["progress", "executions", "summaries", "selections"] {
        std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    let claude = fake_claude_script(tmp.path(), None); // sleeps 30s
    let config = worker_config(tmp.path().to_path_buf(), claude.to_string_lossy().to_string(), Duration::from_millis(200));

    std::fs::write(tmp.path().join("workflows.json"), SAMPLE_REGISTRY_JSON).unwrap();
    let registry = WorkflowRegistry::load(&config.workflow_registry_path()).unwrap();
    let event_log = EventLog::new(config.event_log_path());

    let mut summary = s1_summary();
    summary.workspace_path = tmp.path().to_string_lossy().to_string();
    let selection = selection_for(&summary, "fix-links");

    ojb_worker::run_selection(&config, &registry, &selection, &event_log).await.unwrap();

    let execution: ojb_spool::WorkflowExecution = read_record(&execution_path(&config, &summary, "fix-links")).unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Timeout);
    assert_eq!(execution.exit_code, -1);
    assert!(execution.stderr.to_lowercase().contains("timeout"));

    let progress: ProgressSnapshot = read_record(&progress_path(&config, &summary, "fix-links")).unwrap().unwrap();
    assert_eq!(progress.stage, Stage::Completed);

    let events = event_log.read_all().unwrap();
    assert!(events.iter().any(|e| e.event_type == "claude_cli.timeout"));
    assert!(events.iter().any(|e| e.event_type == "claude_cli.killed"));
}

/// An unknown workflow id in the selection is recorded as a per-workflow error and does not
/// panic or abort the worker process.
#[tokio::test]
async fn unknown_workflow_id_is_recorded_as_an_error_execution() {
    let tmp = tempfile::tempdir().unwrap();
    for dir in ["progress", "executions", "summaries", "selections"] {
        std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    let claude = fake_claude_script(tmp.path(), Some("ignored"));
    let config = worker_config(tmp.path().to_path_buf(), claude.to_string_lossy().to_string(), Duration::from_secs(5));

    std::fs::write(tmp.path().join("workflows.json"), SAMPLE_REGISTRY_JSON).unwrap();
    let registry = WorkflowRegistry::load(&config.workflow_registry_path()).unwrap();
    let event_log = EventLog::new(config.event_log_path());

    let mut summary = s1_summary();
    summary.workspace_path = tmp.path().to_string_lossy().to_string();
    let selection = selection_for(&summary, "does-not-exist");

    ojb_worker::run_selection(&config, &registry, &selection, &event_log).await.unwrap();

    let execution: ojb_spool::WorkflowExecution =
        read_record(&execution_path(&config, &summary, "does-not-exist")).unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Error);
    assert!(execution.stdout.is_empty());
    assert!(execution.stderr.contains("does-not-exist"));
}
