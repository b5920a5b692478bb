// SPDX-License-Identifier: MIT

//! Trigger evaluation: which manifests apply to a given session summary (§4.4).

use crate::workflow::{WorkflowManifest, WorkflowRegistry};
use ojb_spool::SessionSummary;

/// A manifest paired with the workflow id it was registered under, in registry iteration order.
pub struct FilteredWorkflow<'a> {
    pub workflow_id: &'a str,
    pub manifest: &'a WorkflowManifest,
}

/// Evaluate every manifest's trigger against `summary`, in registry iteration order, and return
/// those whose trigger fires.
///
/// Per manifest: if `lychee_errors` is set, honor only it (include iff
/// `summary.lychee_status.error_count > 0`); else if `git_modified` is set, honor only it
/// (include iff `summary.git_status.modified_files > 0`); else if `always` is set, include
/// unconditionally; else do not include. Exactly one trigger is consulted per manifest — this
/// mirrors the priority order in §3, not a combination of conditions.
pub fn filter_workflows<'a>(
    registry: &'a WorkflowRegistry,
    summary: &SessionSummary,
) -> Vec<FilteredWorkflow<'a>> {
    registry
        .workflows
        .iter()
        .filter(|(_, manifest)| trigger_fires(manifest, summary))
        .map(|(workflow_id, manifest)| FilteredWorkflow { workflow_id, manifest })
        .collect()
}

fn trigger_fires(manifest: &WorkflowManifest, summary: &SessionSummary) -> bool {
    let t = &manifest.triggers;
    if t.lychee_errors == Some(true) {
        return summary.lychee_status.error_count > 0;
    }
    if t.git_modified == Some(true) {
        return summary.git_status.modified_files > 0;
    }
    if t.always == Some(true) {
        return true;
    }
    false
}
