// SPDX-License-Identifier: MIT

//! Rendering for the three chat-message kinds the bus posts: the workflow menu, the live
//! tracking message, and its terminal (progress/completion) edits (§2, §4.9, §4.10).

use crate::callback::CallbackMap;
use crate::tracking::TrackingKey;
use ojb_registry::FilteredWorkflow;
use ojb_spool::{CallbackToken, ExecutionStatus, ProgressSnapshot, SessionSummary, Stage, TrackingRecord, WorkflowExecution};
use ojb_transport::{escape, truncate, Button, Keyboard};

/// Build the menu message text and its inline keyboard: one button per filtered workflow plus a
/// trailing custom-prompt button (§2, §8 S1).
pub fn build_menu(
    summary: &SessionSummary,
    filtered: &[FilteredWorkflow<'_>],
    callbacks: &CallbackMap,
    now_iso: &str,
) -> Result<(String, Keyboard), ojb_spool::SpoolError> {
    let mut text = format!(
        "<b>{}</b>\nBranch: {} · {} modified\n{} link errors",
        escape(&summary.workspace_path),
        escape(&summary.git_status.branch),
        summary.git_status.modified_files,
        summary.lychee_status.error_count,
    );
    if summary.lychee_status.error_count > 0 {
        text.push_str("\n\n");
        text.push_str("View details with the button below, or pick a workflow to run.");
    }

    let mut buttons = Vec::new();
    for workflow in filtered {
        let token = callbacks.create(&CallbackToken {
            workspace_id: summary.workspace_id.clone(),
            workspace_path: summary.workspace_path.clone(),
            session_id: summary.session_id.clone(),
            action: format!("workflow_{}", workflow.workflow_id),
            correlation_id: summary.correlation_id.clone(),
            timestamp: now_iso.to_string(),
        })?;
        buttons.push(Button { label: workflow.manifest.name.clone(), callback_token: token });
    }

    if summary.lychee_status.error_count > 0 {
        let token = callbacks.create(&CallbackToken {
            workspace_id: summary.workspace_id.clone(),
            workspace_path: summary.workspace_path.clone(),
            session_id: summary.session_id.clone(),
            action: "view_details".to_string(),
            correlation_id: summary.correlation_id.clone(),
            timestamp: now_iso.to_string(),
        })?;
        buttons.push(Button { label: "View details".to_string(), callback_token: token });
    }

    let custom_token = callbacks.create(&CallbackToken {
        workspace_id: summary.workspace_id.clone(),
        workspace_path: summary.workspace_path.clone(),
        session_id: summary.session_id.clone(),
        action: "custom_prompt".to_string(),
        correlation_id: summary.correlation_id.clone(),
        timestamp: now_iso.to_string(),
    })?;
    buttons.push(Button { label: "Custom prompt".to_string(), callback_token: custom_token });

    Ok((text, Keyboard::single_column(buttons)))
}

/// The initial "starting" block posted as the tracking message body, including the cached
/// user/assistant snippet context (§4.9).
pub fn build_tracking_message(
    workflow_name: &str,
    git_branch: &str,
    git_modified: u32,
    user_prompt: Option<&str>,
    last_response: Option<&str>,
) -> String {
    let mut text = format!("<b>{}</b>\nBranch: {} · {} modified\n\n", escape(workflow_name), escape(git_branch), git_modified);
    if let Some(prompt) = user_prompt {
        text.push_str(&format!("You: {}\n", escape(&truncate(prompt, 200).text)));
    }
    if let Some(response) = last_response {
        text.push_str(&format!("Assistant: {}\n", escape(&truncate(response, 300).text)));
    }
    text.push_str("\n⏳ starting (0%)");
    text
}

/// Rebuild the tracking message body at a progress transition (§2 step 5).
pub fn build_progress_message(record: &TrackingRecord, snapshot: &ProgressSnapshot) -> String {
    let mut text = format!(
        "<b>{}</b>\nBranch: {} · {} modified\n\n",
        escape(&record.workflow_name),
        escape(&record.git_branch),
        record.git_modified,
    );
    if let Some(prompt) = &record.user_prompt {
        text.push_str(&format!("You: {}\n", escape(&truncate(prompt, 200).text)));
    }
    if let Some(response) = &record.last_response {
        text.push_str(&format!("Assistant: {}\n", escape(&truncate(response, 300).text)));
    }
    let icon = stage_icon(snapshot.stage);
    text.push_str(&format!("\n{icon} {} ({}%)", stage_label(snapshot.stage), snapshot.progress_percent));
    if !snapshot.message.is_empty() {
        text.push_str(&format!("\n{}", escape(&snapshot.message)));
    }
    text
}

/// Rebuild the tracking message body into its terminal form (§2 step 6, §8 S2/S3).
pub fn build_completion_message(record: &TrackingRecord, execution: &WorkflowExecution) -> String {
    let mut text = format!(
        "<b>{}</b>\nBranch: {} · {} modified\n\n",
        escape(&record.workflow_name),
        escape(&record.git_branch),
        record.git_modified,
    );
    if let Some(prompt) = &record.user_prompt {
        text.push_str(&format!("You: {}\n", escape(&truncate(prompt, 200).text)));
    }

    let (icon, label) = match execution.status {
        ExecutionStatus::Success => ("\u{2705}", "completed"),
        ExecutionStatus::Error => ("\u{274c}", "failed"),
        ExecutionStatus::Timeout => ("\u{23f1}\u{fe0f}", "timed out"),
    };
    text.push_str(&format!("\n{icon} {label} ({:.1}s)", execution.duration_seconds));

    let summary_line = summary_from_execution(execution);
    if !summary_line.is_empty() {
        text.push_str(&format!("\nOutput: {}", escape(&truncate(&summary_line, 300).text)));
    }
    text
}

/// The completion message's one-line summary. Prefers the `metadata.summary` string the Worker
/// computed via §4.10's extraction algorithm; falls back to deriving it directly from
/// stdout/stderr for execution records written by a process that didn't populate it (e.g. the
/// legacy approval path, §4.9).
fn summary_from_execution(execution: &WorkflowExecution) -> String {
    if let Some(summary) = execution.metadata.get("summary").and_then(|v| v.as_str()) {
        return summary.to_string();
    }
    match execution.status {
        ExecutionStatus::Success => first_line_from_stdout(&execution.stdout),
        _ => {
            let stderr_line = execution.stderr.lines().find(|l| !l.trim().is_empty());
            stderr_line.map(str::to_string).unwrap_or_else(|| first_line_from_stdout(&execution.stdout))
        }
    }
}

fn first_line_from_stdout(stdout: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        if let Some(result) = value.get("result").and_then(|v| v.as_str()) {
            if let Some(line) = result.lines().find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#')) {
                return truncate(line, 200).text;
            }
        }
        if let (Some(t), Some(subtype)) = (value.get("type").and_then(|v| v.as_str()), value.get("subtype").and_then(|v| v.as_str())) {
            return format!("{t}/{subtype}");
        }
    }
    if let Some(line) = stdout.lines().find(|l| {
        let trimmed = l.trim_start();
        !trimmed.is_empty() && !trimmed.starts_with('{') && !trimmed.starts_with('[')
    }) {
        return line.to_string();
    }
    "Completed".to_string()
}

fn stage_icon(stage: Stage) -> &'static str {
    match stage {
        Stage::Starting => "\u{23f3}",
        Stage::Rendering => "\u{23f3}",
        Stage::Executing => "\u{2699}\u{fe0f}",
        Stage::Waiting => "\u{23f3}",
        Stage::Completed => "\u{2705}",
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Starting => "starting",
        Stage::Rendering => "rendering",
        Stage::Executing => "executing",
        Stage::Waiting => "waiting",
        Stage::Completed => "completed",
    }
}

pub fn tracking_key_for(workspace_id: &str, session_id: &str, workflow_id: &str) -> TrackingKey {
    TrackingKey::new(workspace_id, session_id, workflow_id)
}
