// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for one Worker invocation.
///
/// A `Startup` error means nothing could be attempted at all (bad argument, unreadable
/// registry) and maps to exit code 1 without writing any execution record (§7). Every other
/// variant is recoverable per-workflow: the runner catches it, writes an execution record with
/// `status: error`, and continues to the next workflow in the selection.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("expected exactly one positional argument: an absolute path to a selection or approval file")]
    MissingArgument,

    #[error(transparent)]
    Registry(#[from] ojb_registry::RegistryError),

    #[error(transparent)]
    Spool(#[from] ojb_spool::SpoolError),

    #[error(transparent)]
    EventLog(#[from] ojb_eventlog::EventLogError),

    #[error("no selection or approval file found at {path}")]
    InputNotFound { path: PathBuf },

    #[error("neither the embedded summary_data nor summaries/summary_{session_id}_{workspace_id}.json was available")]
    SummaryUnavailable { session_id: String, workspace_id: String },

    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}
