// SPDX-License-Identifier: MIT

//! Wire record types for the spool directories (§3 of the design spec).
//!
//! Every type here is a plain JSON document written atomically and consumed by exactly one
//! other process across the filesystem boundary. Validation beyond `serde`'s structural checks
//! lives in each type's `SpoolRecord::validate` impl so malformed-but-parseable records (e.g. an
//! empty `workspace_id`) are still rejected-in-place rather than accepted.

use crate::record::SpoolRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `git status --porcelain`-derived summary of a workspace at the moment a session ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: String,
    pub modified_files: u32,
    pub staged_files: u32,
    pub untracked_files: u32,
    #[serde(default)]
    pub porcelain: Vec<String>,
}

/// Link-validator output summarised into a session summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LycheeStatus {
    pub error_count: u32,
    #[serde(default)]
    pub details: String,
}

/// Producer: external session hook. Consumer: Bus.
///
/// `summaries/summary_<session>_<workspace>.json`. Required fields missing or malformed mean the
/// whole file is rejected-in-place (§7) rather than silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub correlation_id: String,
    pub workspace_path: String,
    pub workspace_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub duration_seconds: f64,
    pub repository_root: String,
    pub working_directory: String,
    pub git_status: GitStatus,
    pub lychee_status: LycheeStatus,
    #[serde(default)]
    pub last_user_prompt: Option<String>,
    #[serde(default)]
    pub last_response: Option<String>,
}

impl SpoolRecord for SessionSummary {
    fn validate(&self) -> Result<(), String> {
        if self.workspace_id.is_empty() {
            return Err("workspace_id must not be empty".to_string());
        }
        if self.session_id.is_empty() {
            return Err("session_id must not be empty".to_string());
        }
        if self.workspace_path.is_empty() {
            return Err("workspace_path must not be empty".to_string());
        }
        Ok(())
    }
}

/// One of the fixed actions a callback token can resolve to.
///
/// Not derived `Serialize`/`Deserialize`: on the wire `CallbackToken::action` is a plain string
/// (`workflow_<id>` doesn't fit serde's tagged-enum representations cleanly), so this type is a
/// parse/format helper used on top of that string, not part of the JSON schema itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    AutoFixAll,
    Reject,
    ViewDetails,
    CustomPrompt,
    /// `workflow_<workflow_id>`, carrying the workflow id without its prefix.
    Workflow(String),
}

impl CallbackAction {
    /// Parse the wire form of an action string, splitting the `workflow_<id>` family out of
    /// the fixed variants.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "auto_fix_all" => CallbackAction::AutoFixAll,
            "reject" => CallbackAction::Reject,
            "view_details" => CallbackAction::ViewDetails,
            "custom_prompt" => CallbackAction::CustomPrompt,
            other => match other.strip_prefix("workflow_") {
                Some(workflow_id) => CallbackAction::Workflow(workflow_id.to_string()),
                None => CallbackAction::Workflow(other.to_string()),
            },
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            CallbackAction::AutoFixAll => "auto_fix_all".to_string(),
            CallbackAction::Reject => "reject".to_string(),
            CallbackAction::ViewDetails => "view_details".to_string(),
            CallbackAction::CustomPrompt => "custom_prompt".to_string(),
            CallbackAction::Workflow(id) => format!("workflow_{id}"),
        }
    }
}

/// Producer and consumer: Bus. `callbacks/cb_<hash>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackToken {
    pub workspace_id: String,
    pub workspace_path: String,
    pub session_id: String,
    pub action: String,
    pub correlation_id: String,
    pub timestamp: String,
}

impl SpoolRecord for CallbackToken {
    fn validate(&self) -> Result<(), String> {
        if self.workspace_id.is_empty() || self.session_id.is_empty() {
            return Err("workspace_id and session_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Producer: Bus. Consumer: Worker. `selections/selection_<session>_<workspace>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSelection {
    pub workspace_path: String,
    pub workspace_id: String,
    pub session_id: String,
    pub workflows: Vec<String>,
    pub correlation_id: String,
    pub timestamp: String,
    pub summary_data: Option<SessionSummary>,
    #[serde(default)]
    pub metadata: Value,
}

impl SpoolRecord for WorkflowSelection {
    fn validate(&self) -> Result<(), String> {
        if self.workflows.is_empty() {
            return Err("workflows must list at least one workflow_id".to_string());
        }
        Ok(())
    }
}

/// Producer and consumer: Bus; durable. `tracking/<hash>_<session>_<workflow>_tracking.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingRecord {
    pub message_id: String,
    pub workspace_id: String,
    pub repository_root: String,
    pub working_directory: String,
    pub git_branch: String,
    pub git_modified: u32,
    pub git_staged: u32,
    pub git_untracked: u32,
    pub workflow_name: String,
    pub session_id: String,
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub last_response: Option<String>,
}

impl SpoolRecord for TrackingRecord {
    fn validate(&self) -> Result<(), String> {
        if self.message_id.is_empty() {
            return Err("message_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Stage of a workflow's execution lifecycle (§4.10's state machine).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Rendering,
    Executing,
    Waiting,
    Completed,
}

impl Stage {
    /// Canonical percent for this stage (§4.10).
    pub fn percent(self) -> u8 {
        match self {
            Stage::Starting => 0,
            Stage::Rendering => 25,
            Stage::Executing => 50,
            Stage::Waiting => 75,
            Stage::Completed => 100,
        }
    }
}

/// Status of a progress snapshot (§3: `status ∈ {running, completed, error}`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Completed,
    Error,
}

/// Terminal status of a `WorkflowExecution` (§3: `status ∈ {success, error, timeout}`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

/// Producer: Worker. Consumer: Bus. `progress/<hash>_<session>_<workflow>.json`, overwritten in
/// place at each transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub workspace_id: String,
    pub session_id: String,
    pub workflow_id: String,
    pub status: ProgressStatus,
    pub stage: Stage,
    pub progress_percent: u8,
    pub message: String,
    pub timestamp: String,
}

impl SpoolRecord for ProgressSnapshot {
    fn validate(&self) -> Result<(), String> {
        if self.progress_percent > 100 {
            return Err("progress_percent must be within [0,100]".to_string());
        }
        if self.message.chars().count() > 200 {
            return Err("message must be at most 200 chars".to_string());
        }
        Ok(())
    }
}

/// Producer: Worker. Consumer: Bus; written exactly once per invocation.
/// `executions/execution_<session>_<workspace>_<workflow>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowExecution {
    pub workspace_id: String,
    pub session_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub stdout: String,
    pub stderr: String,
    #[serde(default)]
    pub headless_session_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl SpoolRecord for WorkflowExecution {
    fn validate(&self) -> Result<(), String> {
        if self.workspace_id.is_empty() || self.session_id.is_empty() || self.workflow_id.is_empty()
        {
            return Err("workspace_id, session_id, and workflow_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// The anti-feedback marker (`autofix-in-progress.json`). Its *presence* is the signal; the
/// content is informational for the external session hook (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AntiFeedbackMarker {
    pub session_id: String,
    pub workspace_path: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub started_at: String,
    pub orchestrator_pid: u32,
    pub correlation_id: String,
}

impl SpoolRecord for AntiFeedbackMarker {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_action_round_trips_workflow_variant() {
        let action = CallbackAction::parse("workflow_fix-links");
        assert_eq!(action, CallbackAction::Workflow("fix-links".to_string()));
        assert_eq!(action.to_wire(), "workflow_fix-links");
    }

    #[test]
    fn callback_action_parses_fixed_variants() {
        assert_eq!(CallbackAction::parse("auto_fix_all"), CallbackAction::AutoFixAll);
        assert_eq!(CallbackAction::parse("reject"), CallbackAction::Reject);
        assert_eq!(CallbackAction::parse("view_details"), CallbackAction::ViewDetails);
        assert_eq!(CallbackAction::parse("custom_prompt"), CallbackAction::CustomPrompt);
    }

    #[test]
    fn stage_percents_match_canonical_values() {
        assert_eq!(Stage::Starting.percent(), 0);
        assert_eq!(Stage::Rendering.percent(), 25);
        assert_eq!(Stage::Executing.percent(), 50);
        assert_eq!(Stage::Waiting.percent(), 75);
        assert_eq!(Stage::Completed.percent(), 100);
    }

    #[test]
    fn session_summary_rejects_empty_workspace_id() {
        let summary = sample_summary();
        let mut bad = summary.clone();
        bad.workspace_id = String::new();
        assert!(bad.validate().is_err());
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn progress_snapshot_rejects_percent_over_100() {
        let mut snapshot = sample_progress();
        snapshot.progress_percent = 101;
        assert!(snapshot.validate().is_err());
    }

    fn sample_summary() -> SessionSummary {
        SessionSummary {
            correlation_id: "C1".to_string(),
            workspace_path: "/w".to_string(),
            workspace_id: "WH".to_string(),
            session_id: "S1".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            duration_seconds: 12.0,
            repository_root: "/w".to_string(),
            working_directory: "/w".to_string(),
            git_status: GitStatus {
                branch: "main".to_string(),
                modified_files: 2,
                staged_files: 0,
                untracked_files: 0,
                porcelain: vec!["M a.md".to_string()],
            },
            lychee_status: LycheeStatus { error_count: 3, details: "3 broken".to_string() },
            last_user_prompt: None,
            last_response: None,
        }
    }

    fn sample_progress() -> ProgressSnapshot {
        ProgressSnapshot {
            workspace_id: "WH".to_string(),
            session_id: "S1".to_string(),
            workflow_id: "fix-links".to_string(),
            status: ProgressStatus::Running,
            stage: Stage::Starting,
            progress_percent: 0,
            message: "starting".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }
}
