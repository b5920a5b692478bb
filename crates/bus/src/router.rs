// SPDX-License-Identifier: MIT

//! Callback router: dispatches an inbound button press to its action (§4.9).

use crate::bus::Bus;
use crate::error::CallbackError;
use crate::menu;
use crate::tracking::TrackingKey;
use ojb_core::Clock;
use ojb_spool::{CallbackAction, TrackingRecord, WorkflowSelection};
use ojb_transport::{truncate, CallbackEvent, Transport};

/// Maximum reply length for a `view_details` response, matching the transport's message budget.
const VIEW_DETAILS_BUDGET: usize = 3500;
/// Cap on bullets shown per file in a `view_details` reply (§4.9).
const MAX_ERRORS_PER_FILE: usize = 5;

impl<T: Transport, C: Clock> Bus<T, C> {
    /// Handle one inbound callback event end to end (§4.9).
    pub async fn handle_callback(&self, event: CallbackEvent) {
        self.touch_activity();

        let resolved = self.callbacks.resolve(&event.callback_token);
        let ctx = match resolved {
            Ok(ctx) => ctx,
            Err(err) => {
                let reason = match err {
                    CallbackError::NotFound => "not_found",
                    CallbackError::Expired => "expired",
                };
                tracing::info!(token = %event.callback_token, reason, "callback resolution failed, reporting expired");
                if let Err(e) = self.adapter.edit(&event.chat_id, &event.message_id, "This menu has expired.").await {
                    tracing::error!(error = %e, "failed to edit expired callback message");
                }
                return;
            }
        };

        match CallbackAction::parse(&ctx.action) {
            CallbackAction::ViewDetails => self.handle_view_details(&event, &ctx).await,
            CallbackAction::CustomPrompt => self.handle_custom_prompt(&event).await,
            CallbackAction::Workflow(workflow_id) => self.handle_workflow_selection(&event, &ctx, &workflow_id).await,
            CallbackAction::AutoFixAll => self.handle_legacy_approval(&event, &ctx, "auto_fix_all").await,
            CallbackAction::Reject => self.handle_reject(&event).await,
        }
    }

    async fn handle_view_details(&self, event: &CallbackEvent, ctx: &ojb_spool::CallbackToken) {
        let sidecar = std::path::Path::new(&ctx.workspace_path).join(".lychee-results.json");
        let text = match std::fs::read_to_string(&sidecar) {
            Ok(content) => format_lychee_details(&content),
            Err(_) => "No link-validator details available for this workspace.".to_string(),
        };
        let truncated = truncate(&text, VIEW_DETAILS_BUDGET).text;
        if let Err(e) = self.adapter.send(&event.chat_id, &truncated, None).await {
            tracing::error!(error = %e, "failed to reply with view_details");
        }
    }

    async fn handle_custom_prompt(&self, event: &CallbackEvent) {
        if let Err(e) = self
            .adapter
            .send(&event.chat_id, "Custom prompts are not implemented yet.", None)
            .await
        {
            tracing::error!(error = %e, "failed to acknowledge custom_prompt");
        }
    }

    async fn handle_reject(&self, event: &CallbackEvent) {
        if let Err(e) = self.adapter.edit(&event.chat_id, &event.message_id, "Rejected.").await {
            tracing::error!(error = %e, "failed to acknowledge reject");
        }
    }

    async fn handle_workflow_selection(&self, event: &CallbackEvent, ctx: &ojb_spool::CallbackToken, workflow_id: &str) {
        let Some(summary) = self.summaries.lock().get(&(ctx.workspace_id.clone(), ctx.session_id.clone())).cloned() else {
            tracing::error!(workspace_id = %ctx.workspace_id, session_id = %ctx.session_id, "no cached summary for workflow selection");
            if let Err(e) = self.adapter.edit(&event.chat_id, &event.message_id, "Could not start workflow: session context was lost.").await {
                tracing::error!(error = %e, "failed to report lost-context error");
            }
            return;
        };

        let manifest = self.workflow_registry.workflows.get(workflow_id).cloned();
        let workflow_name = manifest.as_ref().map(|m| m.name.clone()).unwrap_or_else(|| workflow_id.to_string());

        let selection = WorkflowSelection {
            workspace_path: ctx.workspace_path.clone(),
            workspace_id: ctx.workspace_id.clone(),
            session_id: ctx.session_id.clone(),
            workflows: vec![workflow_id.to_string()],
            correlation_id: ctx.correlation_id.clone(),
            timestamp: self.now_iso(),
            summary_data: Some(summary.clone()),
            metadata: serde_json::Value::Null,
        };

        let path = self.config.selections_dir().join(format!("selection_{}_{}.json", ctx.session_id, ctx.workspace_id));
        if let Err(e) = ojb_spool::write_json_atomic(&path, &selection) {
            tracing::error!(error = %e, "failed to write workflow selection");
            return;
        }

        if let Err(e) = self.adapter.delete(&event.chat_id, &event.message_id).await {
            tracing::warn!(error = %e, "failed to delete menu message");
        }

        let tracking_text = menu::build_tracking_message(
            &workflow_name,
            &summary.git_status.branch,
            summary.git_status.modified_files,
            summary.last_user_prompt.as_deref(),
            summary.last_response.as_deref(),
        );
        let message_id = match self.adapter.send(&event.chat_id, &tracking_text, None).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "failed to post tracking message");
                return;
            }
        };

        let record = TrackingRecord {
            message_id,
            workspace_id: ctx.workspace_id.clone(),
            repository_root: summary.repository_root.clone(),
            working_directory: summary.working_directory.clone(),
            git_branch: summary.git_status.branch.clone(),
            git_modified: summary.git_status.modified_files,
            git_staged: summary.git_status.staged_files,
            git_untracked: summary.git_status.untracked_files,
            workflow_name,
            session_id: ctx.session_id.clone(),
            user_prompt: summary.last_user_prompt.clone(),
            last_response: summary.last_response.clone(),
        };
        let key = TrackingKey::new(ctx.workspace_id.clone(), ctx.session_id.clone(), workflow_id.to_string());
        if let Err(e) = self.tracking.insert(key, record) {
            tracing::error!(error = %e, "failed to persist tracking record");
        }

        self.spawn_worker(&path);
    }

    /// Legacy `auto_fix_all`/`reject` path (§4.9): writes an approval file in the same shape as
    /// a `WorkflowSelection` (the legacy schema was never formalized beyond "an approval file");
    /// Worker discriminates only on filename prefix, so this is handled uniformly.
    async fn handle_legacy_approval(&self, event: &CallbackEvent, ctx: &ojb_spool::CallbackToken, workflow_id: &str) {
        let Some(summary) = self.summaries.lock().get(&(ctx.workspace_id.clone(), ctx.session_id.clone())).cloned() else {
            tracing::error!("no cached summary for legacy approval");
            return;
        };

        let selection = WorkflowSelection {
            workspace_path: ctx.workspace_path.clone(),
            workspace_id: ctx.workspace_id.clone(),
            session_id: ctx.session_id.clone(),
            workflows: vec![workflow_id.to_string()],
            correlation_id: ctx.correlation_id.clone(),
            timestamp: self.now_iso(),
            summary_data: Some(summary),
            metadata: serde_json::Value::Null,
        };

        let path = self.config.approvals_dir().join(format!("approval_{}_{}.json", ctx.session_id, ctx.workspace_id));
        if let Err(e) = ojb_spool::write_json_atomic(&path, &selection) {
            tracing::error!(error = %e, "failed to write legacy approval file");
            return;
        }

        if let Err(e) = self.adapter.edit(&event.chat_id, &event.message_id, "Starting auto-fix...").await {
            tracing::warn!(error = %e, "failed to acknowledge auto_fix_all");
        }

        self.spawn_worker(&path);
    }
}

fn format_lychee_details(raw_json: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw_json) else {
        return "Link-validator details could not be parsed.".to_string();
    };
    let Some(files) = value.as_object() else {
        return "Link-validator details were in an unexpected shape.".to_string();
    };

    let mut total = 0usize;
    let mut out = String::new();
    for (file, errors) in files {
        let Some(errors) = errors.as_array() else { continue };
        total += errors.len();
        out.push_str(&format!("\n<b>{}</b>\n", ojb_transport::escape(file)));
        for error in errors.iter().take(MAX_ERRORS_PER_FILE) {
            let line = error.as_str().unwrap_or("(unreadable entry)");
            out.push_str(&format!("- {}\n", ojb_transport::escape(line)));
        }
        if errors.len() > MAX_ERRORS_PER_FILE {
            out.push_str(&format!("  ...and {} more\n", errors.len() - MAX_ERRORS_PER_FILE));
        }
    }
    format!("{total} broken link(s) found:\n{out}")
}
