// SPDX-License-Identifier: MIT

//! The three cooperative scanners: summary/menu, progress, and execution (§4.8).

use crate::bus::Bus;
use crate::menu;
use crate::tracking::TrackingKey;
use ojb_core::{Clock, Component, EventRecord};
use ojb_registry::filter_workflows;
use ojb_spool::{
    list_spool_files, read_record, remove_consumed, ProgressSnapshot, SessionSummary, Stage, WorkflowExecution,
};
use ojb_transport::Transport;

impl<T: Transport, C: Clock> Bus<T, C> {
    /// `summaries/*.json` → post menu (§2 step 2, §4.4, §8 S1). Also drains the legacy
    /// `notifications/` inbox, which carries the same record shape.
    pub async fn scan_summaries(&self) {
        for dir in [self.config.summaries_dir(), self.config.notifications_dir()] {
            let Ok(files) = list_spool_files(&dir) else { continue };
            for path in files {
                self.handle_summary_file(&path).await;
            }
        }
    }

    async fn handle_summary_file(&self, path: &std::path::Path) {
        let summary = match read_record::<SessionSummary>(path) {
            Ok(Some(summary)) => summary,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rejecting malformed summary in place");
                return;
            }
        };

        self.log_event(&summary.correlation_id, Some(&summary.workspace_id), Some(&summary.session_id), "summary.received", serde_json::Value::Null);

        let filtered = filter_workflows(&self.workflow_registry, &summary);
        if !filtered.is_empty() {
            if let Some(chat_id) = self.config.chat_id.clone() {
                let now_iso = self.now_iso();
                match menu::build_menu(&summary, &filtered, &self.callbacks, &now_iso) {
                    Ok((text, keyboard)) => {
                        if let Err(e) = self.adapter.send(&chat_id, &text, Some(keyboard)).await {
                            tracing::error!(error = %e, "failed to post menu message");
                        } else {
                            self.touch_activity();
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "failed to build menu message"),
                }
            } else {
                tracing::warn!("no chat_id configured, dropping menu for this summary");
            }
        }

        self.summaries.lock().insert((summary.workspace_id.clone(), summary.session_id.clone()), summary.clone());
        self.log_event(&summary.correlation_id, Some(&summary.workspace_id), Some(&summary.session_id), "summary.processed", serde_json::json!({"workflow_count": filtered.len()}));

        if let Err(e) = remove_consumed(path) {
            tracing::error!(path = %path.display(), error = %e, "failed to remove consumed summary file");
        }
    }

    /// `progress/*.json` → edit the tracked message (§2 step 5, §8 S2/S5).
    pub async fn scan_progress(&self) {
        let Ok(files) = list_spool_files(&self.config.progress_dir()) else { return };
        for path in files {
            self.handle_progress_file(&path).await;
        }
    }

    async fn handle_progress_file(&self, path: &std::path::Path) {
        let snapshot = match read_record::<ProgressSnapshot>(path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rejecting malformed progress snapshot in place");
                return;
            }
        };

        let key = TrackingKey::new(snapshot.workspace_id.clone(), snapshot.session_id.clone(), snapshot.workflow_id.clone());
        let Some(record) = self.tracking.get(&key) else {
            // Snapshot from a run whose tracking was already swept: skip silently (§8 invariant 1).
            if snapshot.stage == Stage::Completed {
                let _ = remove_consumed(path);
            }
            return;
        };

        if let Some(chat_id) = self.config.chat_id.clone() {
            let text = menu::build_progress_message(&record, &snapshot);
            let dedup_key = crate::dedup::DedupStore::key(&snapshot.workspace_id, &snapshot.session_id, &snapshot.workflow_id);
            if !self.dedup.is_duplicate(&dedup_key, &text) {
                match self.adapter.edit(&chat_id, &record.message_id, &text).await {
                    Ok(()) => {
                        let _ = self.dedup.record_sent(&dedup_key, &text);
                        self.touch_activity();
                    }
                    Err(e) => tracing::error!(error = %e, "failed to edit progress message"),
                }
            }
        }

        if snapshot.stage == Stage::Completed {
            let _ = remove_consumed(path);
        }
    }

    /// `executions/*.json` → finalize the tracked message and clear tracking (§2 step 6, §8 S2/S3).
    pub async fn scan_executions(&self) {
        let Ok(files) = list_spool_files(&self.config.executions_dir()) else { return };
        for path in files {
            self.handle_execution_file(&path).await;
        }
    }

    async fn handle_execution_file(&self, path: &std::path::Path) {
        let execution = match read_record::<WorkflowExecution>(path) {
            Ok(Some(execution)) => execution,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rejecting malformed execution record in place");
                return;
            }
        };

        let key = TrackingKey::new(execution.workspace_id.clone(), execution.session_id.clone(), execution.workflow_id.clone());
        if let Some(record) = self.tracking.get(&key) {
            if let Some(chat_id) = self.config.chat_id.clone() {
                let text = menu::build_completion_message(&record, &execution);
                if let Err(e) = self.adapter.edit(&chat_id, &record.message_id, &text).await {
                    tracing::error!(error = %e, "failed to edit completion message");
                } else {
                    self.touch_activity();
                }
            }
            let _ = self.tracking.remove(&key);
            let dedup_key = crate::dedup::DedupStore::key(&execution.workspace_id, &execution.session_id, &execution.workflow_id);
            self.dedup.clear(&dedup_key);
        } else if let Some(chat_id) = self.config.chat_id.clone() {
            // No tracking entry: post a fallback "recovered" notification (§8 invariant 2).
            let text = format!(
                "Recovered execution for workflow {} (session {}): status {:?}",
                execution.workflow_id, execution.session_id, execution.status
            );
            if let Err(e) = self.adapter.send(&chat_id, &text, None).await {
                tracing::error!(error = %e, "failed to post recovered-execution notification");
            }
        }

        self.log_event("", Some(&execution.workspace_id), Some(&execution.session_id), "execution.created", serde_json::json!({"status": format!("{:?}", execution.status)}));

        if let Err(e) = remove_consumed(path) {
            tracing::error!(path = %path.display(), error = %e, "failed to remove consumed execution file");
        }
    }

    /// Process any files already present from before startup (§4.8 steps 3 and 5).
    pub async fn drain_at_startup(&self) {
        match self.tracking.restore_from_disk() {
            Ok(count) => tracing::info!(restored = count, "restored tracking records from disk"),
            Err(e) => tracing::error!(error = %e, "failed to restore tracking records at startup"),
        }

        self.scan_summaries().await;
        self.scan_executions().await;
        for stale in list_spool_files(&self.config.completions_dir()).unwrap_or_default() {
            tracing::warn!(path = %stale.display(), "dropping stale legacy completion record at startup");
            let _ = remove_consumed(&stale);
        }
    }

    /// Appends one event-log record. A write failure is never silently dropped (§4.11, §7): it
    /// marks the loop fatal so `run()` returns and `main` exits non-zero, rather than continuing
    /// to operate with a gap in the trace.
    fn log_event(&self, correlation_id: &str, workspace_id: Option<&str>, session_id: Option<&str>, event_type: &str, metadata: serde_json::Value) {
        let mut record = EventRecord::new(correlation_id, Component::Bus, event_type, self.clock().epoch_ms()).with_metadata(metadata);
        if let Some(w) = workspace_id {
            record = record.with_workspace(w);
        }
        if let Some(s) = session_id {
            record = record.with_session(s);
        }
        if let Err(e) = self.event_log.append(&record) {
            tracing::error!(error = %e, "event log append failed, shutting down (fail-fast)");
            self.mark_fatal();
        }
    }
}
