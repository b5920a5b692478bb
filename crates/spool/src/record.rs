// SPDX-License-Identifier: MIT

use crate::error::SpoolError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// A JSON record that can be read from a spool directory.
///
/// `validate` checks required-field invariants beyond what `serde` structural deserialization
/// already enforces (e.g. "non-empty", "positive") — most record types in this system have none
/// and simply return `Ok(())`.
pub trait SpoolRecord: DeserializeOwned {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// List every regular file directly under `dir`, skipping the reserved `schema.json` filename
/// (§4.8's progress scanner) and any directory entries. Returns an empty vector if `dir` does
/// not exist — an empty spool is not an error.
pub fn list_spool_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some("schema.json") {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}

/// Read and validate a single record, tolerating a file that vanished between listing and
/// reading (returns `Ok(None)` — "already consumed," not an error, per §4.1).
///
/// A malformed or validation-failing file is returned as `Err` and left on disk for a human to
/// repair; it is never deleted on parse failure.
pub fn read_record<T: SpoolRecord>(path: &Path) -> Result<Option<T>, SpoolError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(SpoolError::Io { path: path.to_path_buf(), source }),
    };

    let value: T = serde_json::from_str(&content).map_err(|e| SpoolError::Malformed {
        path: path.to_path_buf(),
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
        content: content.clone(),
    })?;

    value.validate().map_err(|detail| SpoolError::Validation {
        path: path.to_path_buf(),
        detail,
        content,
    })?;

    Ok(Some(value))
}

/// Remove a consumed spool file, tolerating the case where it was already removed by another
/// consumer or the TTL sweeper.
pub fn remove_consumed(path: &Path) -> Result<(), SpoolError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SpoolError::Io { path: path.to_path_buf(), source }),
    }
}

/// Read a record and, on success, unlink its file. The caller's `handle` closure runs between
/// the two (list → open → parse → act → unlink, per §4.1) so a handler failure leaves the file
/// in place for inspection rather than silently discarding it.
pub fn consume_record<T, F, E>(path: &Path, handle: F) -> Result<bool, E>
where
    T: SpoolRecord,
    F: FnOnce(T) -> Result<(), E>,
    E: From<SpoolError>,
{
    let Some(record) = read_record::<T>(path)? else {
        return Ok(false);
    };
    handle(record)?;
    remove_consumed(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize)]
    struct Thing {
        name: String,
    }

    impl SpoolRecord for Thing {
        fn validate(&self) -> Result<(), String> {
            if self.name.is_empty() {
                Err("name must not be empty".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn list_spool_files_skips_schema_json_and_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(list_spool_files(&dir.path().join("missing")).unwrap().is_empty());

        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("schema.json"), "{}").unwrap();
        let files = list_spool_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.json"));
    }

    #[test]
    fn read_record_tolerates_vanished_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.json");
        assert!(read_record::<Thing>(&path).unwrap().is_none());
    }

    #[test]
    fn read_record_rejects_malformed_json_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_record::<Thing>(&path).unwrap_err();
        assert!(matches!(err, SpoolError::Malformed { .. }));
        assert!(path.exists(), "malformed file must be left in place");
    }

    #[test]
    fn read_record_rejects_failed_validation_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty-name.json");
        std::fs::write(&path, r#"{"name":""}"#).unwrap();

        let err = read_record::<Thing>(&path).unwrap_err();
        assert!(matches!(err, SpoolError::Validation { .. }));
        assert!(path.exists());
    }

    #[test]
    fn consume_record_unlinks_only_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.json");
        std::fs::write(&path, r#"{"name":"a"}"#).unwrap();

        let consumed = consume_record::<Thing, _, SpoolError>(&path, |_| Ok(())).unwrap();
        assert!(consumed);
        assert!(!path.exists());
    }

    #[test]
    fn consume_record_leaves_file_when_handler_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.json");
        std::fs::write(&path, r#"{"name":"a"}"#).unwrap();

        let result = consume_record::<Thing, _, SpoolError>(&path, |_| {
            Err(SpoolError::Io {
                path: path.clone(),
                source: std::io::Error::other("boom"),
            })
        });
        assert!(result.is_err());
        assert!(path.exists());
    }
}
