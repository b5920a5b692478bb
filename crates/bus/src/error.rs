// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the bus event loop and its startup sequence.
///
/// Library-internal errors (spool, registry, transport, event log) are wrapped rather than
/// flattened so a caller can still match on the originating subsystem; `main.rs` is the only
/// place that converts this into an `anyhow::Error` (§7).
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to acquire PID lock at {path}: {source}")]
    LockContended { path: PathBuf, #[source] source: std::io::Error },

    #[error("stale PID file at {path}: owner pid {pid} is not running; remove it manually with `rm {path}`")]
    StaleLock { path: PathBuf, pid: u32 },

    #[error("another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error(transparent)]
    Registry(#[from] ojb_registry::RegistryError),

    #[error(transparent)]
    Spool(#[from] ojb_spool::SpoolError),

    #[error(transparent)]
    Transport(#[from] ojb_transport::TransportError),

    #[error(transparent)]
    EventLog(#[from] ojb_eventlog::EventLogError),

    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

/// Errors resolving a callback token (§4.2). Distinct from `BusError` because the router
/// reports both variants identically to the user ("expired") while the event log preserves the
/// distinction (§4.2).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback token not found")]
    NotFound,
    #[error("callback token expired")]
    Expired,
}
