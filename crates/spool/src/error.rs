// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing a spool record.
///
/// Validation and malformed-JSON errors intentionally carry the file's raw content and, for
/// malformed JSON, a line/column hint — the file is left on disk for a human to repair (§4.1,
/// §7: reject-in-place, never silently dropped).
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("malformed JSON in {path} at line {line}, column {column}: {message}\n--- file content ---\n{content}")]
    Malformed { path: PathBuf, line: usize, column: usize, message: String, content: String },

    #[error("{path} failed validation: {detail}\n--- file content ---\n{content}")]
    Validation { path: PathBuf, detail: String, content: String },

    #[error("failed to serialize record for {path}: {source}")]
    Serialize { path: PathBuf, #[source] source: serde_json::Error },
}
