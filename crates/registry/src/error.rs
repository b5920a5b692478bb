// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or rendering against the workflow/workspace registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("malformed registry JSON at {path}: {source}")]
    Malformed { path: PathBuf, #[source] source: serde_json::Error },

    #[error("workflow {workflow_id} declares no trigger (lychee_errors, git_modified, or always)")]
    NoTrigger { workflow_id: String },

    #[error("unbalanced {{{{#if}}}}/{{{{/if}}}} block in template for workflow {workflow_id}")]
    UnbalancedConditional { workflow_id: String },
}
