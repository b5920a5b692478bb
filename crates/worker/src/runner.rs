// SPDX-License-Identifier: MIT

//! The per-workflow state machine (§4.10): render, mark, spawn, wait, record.

use crate::config::Config;
use crate::error::WorkerError;
use crate::marker::AntiFeedbackGuard;
use crate::subprocess::{self, SubprocessOutcome};
use crate::summary;
use ojb_core::{Component, EventRecord};
use ojb_eventlog::EventLog;
use ojb_registry::{context_for_summary, render, WorkflowRegistry};
use ojb_spool::{
    read_record, write_json_atomic, AntiFeedbackMarker, ExecutionStatus, ProgressSnapshot,
    ProgressStatus, SessionSummary, Stage, WorkflowExecution, WorkflowSelection,
};
use serde_json::json;
use std::path::Path;

/// Run every workflow named in `selection.workflows`, strictly in the order listed (§4.10's
/// dependency-ordering note: declared `dependencies` are never honored by reordering, only
/// logged once as a warning here if any requested workflow declares them).
///
/// A failure inside one workflow (render error, unknown id, subprocess error) is recorded as
/// that workflow's execution outcome and does not stop the remaining workflows in the
/// selection. Only an event-log write failure is fatal to the whole invocation (§7: the event
/// log is fail-fast, never silently dropped).
pub async fn run_selection(
    config: &Config,
    registry: &WorkflowRegistry,
    selection: &WorkflowSelection,
    event_log: &EventLog,
) -> Result<(), WorkerError> {
    if registry.any_declares_dependencies(&selection.workflows) {
        tracing::warn!(
            workflows = ?selection.workflows,
            "one or more requested workflows declare dependencies; executing in input order without reordering"
        );
    }

    let summary = resolve_summary(config, selection)?;

    for workflow_id in &selection.workflows {
        run_one_workflow(config, registry, selection, &summary, workflow_id, event_log).await?;
    }

    Ok(())
}

/// §4.10's fallback summary lookup: prefer the embedded `summary_data`; if absent, re-read
/// `summaries/summary_{session_id}_{workspace_id}.json` by name (it may not have been unlinked
/// yet in a startup race); if neither is available, this is a hard per-invocation error.
fn resolve_summary(config: &Config, selection: &WorkflowSelection) -> Result<SessionSummary, WorkerError> {
    if let Some(summary) = &selection.summary_data {
        return Ok(summary.clone());
    }

    let fallback_path = config
        .summaries_dir()
        .join(format!("summary_{}_{}.json", selection.session_id, selection.workspace_id));
    match read_record::<SessionSummary>(&fallback_path) {
        Ok(Some(summary)) => Ok(summary),
        Ok(None) | Err(_) => Err(WorkerError::SummaryUnavailable {
            session_id: selection.session_id.clone(),
            workspace_id: selection.workspace_id.clone(),
        }),
    }
}

async fn run_one_workflow(
    config: &Config,
    registry: &WorkflowRegistry,
    selection: &WorkflowSelection,
    summary: &SessionSummary,
    workflow_id: &str,
    event_log: &EventLog,
) -> Result<(), WorkerError> {
    let started = std::time::Instant::now();
    let progress_path =
        config.progress_dir().join(format!("{}_{}_{}.json", selection.workspace_id, selection.session_id, workflow_id));
    let execution_path = config
        .executions_dir()
        .join(format!("execution_{}_{}_{}.json", selection.session_id, selection.workspace_id, workflow_id));

    log_event(event_log, selection, workflow_id, "workflow.started", json!({}))?;
    write_progress(&progress_path, selection, workflow_id, Stage::Starting, ProgressStatus::Running, "starting");

    let Some(manifest) = registry.workflows.get(workflow_id) else {
        let message = format!("unknown workflow id {workflow_id}");
        write_progress(&progress_path, selection, workflow_id, Stage::Completed, ProgressStatus::Error, &message);
        write_execution(
            &execution_path,
            selection,
            workflow_id,
            ExecutionStatus::Error,
            -1,
            started.elapsed().as_secs_f64(),
            String::new(),
            message,
            None,
        );
        log_event(event_log, selection, workflow_id, "orchestrator.failed", json!({"reason": "unknown_workflow"}))?;
        return Ok(());
    };

    write_progress(&progress_path, selection, workflow_id, Stage::Rendering, ProgressStatus::Running, "rendering prompt");
    let ctx = context_for_summary(summary);
    let rendered = match render(&manifest.prompt_template, &ctx, workflow_id) {
        Ok(text) => text,
        Err(e) => {
            let message = e.to_string();
            write_progress(&progress_path, selection, workflow_id, Stage::Completed, ProgressStatus::Error, &message);
            write_execution(
                &execution_path,
                selection,
                workflow_id,
                ExecutionStatus::Error,
                -1,
                started.elapsed().as_secs_f64(),
                String::new(),
                message,
                None,
            );
            log_event(event_log, selection, workflow_id, "orchestrator.failed", json!({"reason": "render_error"}))?;
            return Ok(());
        }
    };

    let marker = AntiFeedbackMarker {
        session_id: selection.session_id.clone(),
        workspace_path: selection.workspace_path.clone(),
        workflow_id: workflow_id.to_string(),
        workflow_name: manifest.name.clone(),
        started_at: chrono::Utc::now().to_rfc3339(),
        orchestrator_pid: std::process::id(),
        correlation_id: selection.correlation_id.clone(),
    };
    // The marker is advisory (it feeds an external hook that suppresses feedback loops); a
    // failure to write it is logged and does not block the workflow itself from running.
    let _guard = AntiFeedbackGuard::acquire(&config.anti_feedback_marker_path(), &marker)
        .inspect_err(|e| tracing::error!(error = %e, "failed to write anti-feedback marker, continuing without it"))
        .ok();

    execute_and_record(
        config, selection, workflow_id, &progress_path, &execution_path, &rendered, started, event_log,
    )
    .await
}

async fn execute_and_record(
    config: &Config,
    selection: &WorkflowSelection,
    workflow_id: &str,
    progress_path: &Path,
    execution_path: &Path,
    rendered_prompt: &str,
    started: std::time::Instant,
    event_log: &EventLog,
) -> Result<(), WorkerError> {
    write_progress(progress_path, selection, workflow_id, Stage::Executing, ProgressStatus::Running, "executing");
    log_event(event_log, selection, workflow_id, "claude_cli.started", json!({}))?;

    let args = vec!["--print".to_string(), rendered_prompt.to_string()];
    write_progress(progress_path, selection, workflow_id, Stage::Waiting, ProgressStatus::Running, "waiting for assistant");

    let outcome = subprocess::run(
        &config.claude_cli_bin,
        &args,
        Path::new(&selection.workspace_path),
        config.claude_cli_timeout,
    )
    .await;

    let duration = started.elapsed().as_secs_f64();
    let (status, exit_code, stdout, stderr, human_summary) = match outcome {
        SubprocessOutcome::Success { exit_code, stdout, stderr } if exit_code == 0 => {
            let human = summary::summarize_success(&stdout);
            log_event(event_log, selection, workflow_id, "claude_cli.completed", json!({"exit_code": exit_code}))?;
            (ExecutionStatus::Success, exit_code, stdout, stderr, human)
        }
        SubprocessOutcome::Success { exit_code, stdout, stderr } => {
            let human = summary::summarize_failure(&stdout, &stderr);
            log_event(event_log, selection, workflow_id, "claude_cli.completed", json!({"exit_code": exit_code}))?;
            (ExecutionStatus::Error, exit_code, stdout, stderr, human)
        }
        SubprocessOutcome::Timeout => {
            let message = subprocess::timeout_message(config.claude_cli_timeout);
            log_event(event_log, selection, workflow_id, "claude_cli.timeout", json!({}))?;
            log_event(event_log, selection, workflow_id, "claude_cli.killed", json!({}))?;
            (ExecutionStatus::Timeout, -1, String::new(), message.clone(), message)
        }
        SubprocessOutcome::Error { stderr } => {
            let human = summary::summarize_failure("", &stderr);
            (ExecutionStatus::Error, -1, String::new(), stderr, human)
        }
    };

    let progress_status = if status == ExecutionStatus::Success { ProgressStatus::Completed } else { ProgressStatus::Error };
    write_progress(progress_path, selection, workflow_id, Stage::Completed, progress_status, &human_summary);
    write_execution(execution_path, selection, workflow_id, status, exit_code, duration, stdout, stderr, Some(human_summary));

    match status {
        ExecutionStatus::Success => log_event(event_log, selection, workflow_id, "orchestrator.completed", json!({}))?,
        _ => log_event(event_log, selection, workflow_id, "orchestrator.failed", json!({"status": format!("{status:?}")}))?,
    }
    log_event(event_log, selection, workflow_id, "execution.created", json!({}))?;
    Ok(())
}

fn write_progress(
    path: &Path,
    selection: &WorkflowSelection,
    workflow_id: &str,
    stage: Stage,
    status: ProgressStatus,
    message: &str,
) {
    let snapshot = ProgressSnapshot {
        workspace_id: selection.workspace_id.clone(),
        session_id: selection.session_id.clone(),
        workflow_id: workflow_id.to_string(),
        status,
        stage,
        progress_percent: stage.percent(),
        message: message.chars().take(200).collect(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    if let Err(e) = write_json_atomic(path, &snapshot) {
        tracing::error!(error = %e, path = %path.display(), "failed to write progress snapshot");
    }
}

#[allow(clippy::too_many_arguments)]
fn write_execution(
    path: &Path,
    selection: &WorkflowSelection,
    workflow_id: &str,
    status: ExecutionStatus,
    exit_code: i32,
    duration_seconds: f64,
    stdout: String,
    stderr: String,
    summary_line: Option<String>,
) {
    let metadata = match summary_line {
        Some(summary) => json!({"summary": summary}),
        None => serde_json::Value::Null,
    };
    let execution = WorkflowExecution {
        workspace_id: selection.workspace_id.clone(),
        session_id: selection.session_id.clone(),
        workflow_id: workflow_id.to_string(),
        status,
        exit_code,
        duration_seconds,
        stdout,
        stderr,
        headless_session_id: None,
        metadata,
    };
    if let Err(e) = write_json_atomic(path, &execution) {
        tracing::error!(error = %e, path = %path.display(), "failed to write execution record");
    }
}

fn log_event(
    event_log: &EventLog,
    selection: &WorkflowSelection,
    workflow_id: &str,
    event_type: &str,
    metadata: serde_json::Value,
) -> Result<(), WorkerError> {
    let mut fields = metadata.as_object().cloned().unwrap_or_default();
    fields.insert("workflow_id".to_string(), json!(workflow_id));
    let record = EventRecord::new(selection.correlation_id.clone(), Component::Worker, event_type, epoch_ms())
        .with_workspace(selection.workspace_id.clone())
        .with_session(selection.session_id.clone())
        .with_metadata(serde_json::Value::Object(fields));
    event_log.append(&record)?;
    Ok(())
}

fn epoch_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
