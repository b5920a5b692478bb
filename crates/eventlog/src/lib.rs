// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Append-only structured event log shared by the bus and worker processes.
//!
//! Despite the on-disk name `events.db`, this is a newline-delimited JSON file, not a database —
//! the name is kept to match the layout in the design spec. Both the bus and a concurrently
//! running worker may append to the same file; each append locks the whole file for the
//! duration of a single write so records never interleave mid-line.

use fs2::FileExt;
use ojb_core::EventRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("failed to open event log at {path}: {source}")]
    Open { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to lock event log at {path}: {source}")]
    Lock { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to serialize event record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write event record to {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
}

/// Handle to the append-only event log.
///
/// Cheap to construct; every `append` call opens, locks, writes, and closes the file, so no
/// state is held between calls (both the bus's long lifetime and the worker's one-shot
/// lifetime can use the same type).
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a single record. Fails loudly — the error-handling design (§7) treats event-log
    /// write failures as fail-fast, never silently dropped, so every call site must propagate
    /// this `Result` with `?` rather than ignoring it.
    pub fn append(&self, record: &EventRecord) -> Result<(), EventLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventLogError::Open { path: self.path.clone(), source })?;

        file.lock_exclusive().map_err(|source| EventLogError::Lock { path: self.path.clone(), source })?;
        let result = file.write_all(line.as_bytes());
        let _ = fs2::FileExt::unlock(&file);
        result.map_err(|source| EventLogError::Write { path: self.path.clone(), source })
    }

    /// Read every record currently in the log, skipping lines that fail to parse (a partially
    /// written final line after a crash is tolerated, not fatal).
    pub fn read_all(&self) -> Result<Vec<EventRecord>, EventLogError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(EventLogError::Open { path: self.path.clone(), source }),
        };

        Ok(text.lines().filter_map(|line| serde_json::from_str(line).ok()).collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
