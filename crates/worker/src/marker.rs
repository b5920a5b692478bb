// SPDX-License-Identifier: MIT

//! The anti-feedback marker (§4.10, §6): written before the external assistant is spawned,
//! always removed on the way out — success, error, or panic — via a drop guard, since Worker is
//! single-threaded and short-lived and has no other natural `finally` point.

use ojb_spool::{write_json_atomic, AntiFeedbackMarker, SpoolError};
use std::path::{Path, PathBuf};

/// Holds the marker file for as long as the external assistant subprocess runs. Dropping it
/// removes the file unconditionally (best-effort: a removal failure is logged, never
/// propagated, since the caller is usually already unwinding from some other error).
pub struct AntiFeedbackGuard {
    path: PathBuf,
}

impl AntiFeedbackGuard {
    pub fn acquire(path: &Path, marker: &AntiFeedbackMarker) -> Result<Self, SpoolError> {
        write_json_atomic(path, marker)?;
        Ok(Self { path: path.to_path_buf() })
    }
}

impl Drop for AntiFeedbackGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove anti-feedback marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_marker() -> AntiFeedbackMarker {
        AntiFeedbackMarker {
            session_id: "S1".to_string(),
            workspace_path: "/w".to_string(),
            workflow_id: "fix-links".to_string(),
            workflow_name: "Fix broken links".to_string(),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            orchestrator_pid: std::process::id(),
            correlation_id: "C1".to_string(),
        }
    }

    #[test]
    fn acquire_writes_marker_and_drop_removes_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("autofix-in-progress.json");
        {
            let _guard = AntiFeedbackGuard::acquire(&path, &sample_marker()).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_marker_already_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("autofix-in-progress.json");
        let guard = AntiFeedbackGuard::acquire(&path, &sample_marker()).unwrap();
        std::fs::remove_file(&path).unwrap();
        drop(guard);
    }
}
