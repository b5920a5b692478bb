// SPDX-License-Identifier: MIT

//! Tracking store: the durable map of live workflows to the chat message they edit (§3, §4.8).
//!
//! `(workspace_id, session_id, workflow_id)` identifies one live workflow instance. The
//! in-memory map is restored from `tracking/*.json` at Bus startup; a single record that fails
//! to parse is logged and skipped, not fatal (§7).

use ojb_spool::{list_spool_files, read_record, remove_consumed, write_json_atomic, SpoolError, TrackingRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Composite key identifying one live workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingKey {
    pub workspace_id: String,
    pub session_id: String,
    pub workflow_id: String,
}

impl TrackingKey {
    pub fn new(workspace_id: impl Into<String>, session_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self { workspace_id: workspace_id.into(), session_id: session_id.into(), workflow_id: workflow_id.into() }
    }

    fn file_stem(&self) -> String {
        format!("{}_{}_{}_tracking", self.workspace_id, self.session_id, self.workflow_id)
    }
}

pub struct TrackingStore {
    dir: PathBuf,
    ttl: Duration,
    entries: Mutex<HashMap<TrackingKey, TrackingRecord>>,
}

impl TrackingStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl, entries: Mutex::new(HashMap::new()) }
    }

    fn path_for(&self, key: &TrackingKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Restore the in-memory map from disk at startup (§4.8 step 3). Per-file parse failures are
    /// logged and skipped; the rest of the restore proceeds.
    pub fn restore_from_disk(&self) -> std::io::Result<usize> {
        let files = list_spool_files(&self.dir)?;
        let mut restored = 0;
        for path in files {
            let key = match parse_key_from_filename(&path) {
                Some(key) => key,
                None => {
                    tracing::warn!(path = %path.display(), "tracking file name does not match expected pattern, skipping");
                    continue;
                }
            };
            match read_record::<TrackingRecord>(&path) {
                Ok(Some(record)) => {
                    self.entries.lock().insert(key, record);
                    restored += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to restore tracking record, skipping");
                }
            }
        }
        Ok(restored)
    }

    /// Record a new live workflow: persisted atomically, then cached in memory.
    pub fn insert(&self, key: TrackingKey, record: TrackingRecord) -> Result<(), SpoolError> {
        write_json_atomic(self.path_for(&key), &record)?;
        self.entries.lock().insert(key, record);
        Ok(())
    }

    pub fn get(&self, key: &TrackingKey) -> Option<TrackingRecord> {
        self.entries.lock().get(key).cloned()
    }

    /// Remove from memory and disk (execution consumption, §3).
    pub fn remove(&self, key: &TrackingKey) -> Result<Option<TrackingRecord>, SpoolError> {
        let removed = self.entries.lock().remove(key);
        remove_consumed(&self.path_for(key))?;
        Ok(removed)
    }

    /// TTL sweep (§4.1): 30 minutes of mtime age. Removes both the disk file and any matching
    /// in-memory entry whose path has aged out.
    pub fn sweep_expired(&self) -> std::io::Result<usize> {
        let files = list_spool_files(&self.dir)?;
        let mut removed = 0;
        for path in files {
            let Ok(metadata) = path.metadata() else { continue };
            let Ok(modified) = metadata.modified() else { continue };
            let age = std::time::SystemTime::now().duration_since(modified).unwrap_or_default();
            if age > self.ttl {
                if let Some(key) = parse_key_from_filename(&path) {
                    self.entries.lock().remove(&key);
                }
                if std::fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_key_from_filename(path: &std::path::Path) -> Option<TrackingKey> {
    let stem = path.file_stem()?.to_str()?.strip_suffix("_tracking").unwrap_or(path.file_stem()?.to_str()?);
    let mut parts = stem.splitn(3, '_');
    let workspace_id = parts.next()?.to_string();
    let session_id = parts.next()?.to_string();
    let workflow_id = parts.next()?.to_string();
    Some(TrackingKey::new(workspace_id, session_id, workflow_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record(message_id: &str) -> TrackingRecord {
        TrackingRecord {
            message_id: message_id.to_string(),
            workspace_id: "WH".to_string(),
            repository_root: "/w".to_string(),
            working_directory: "/w".to_string(),
            git_branch: "main".to_string(),
            git_modified: 2,
            git_staged: 0,
            git_untracked: 0,
            workflow_name: "Fix broken links".to_string(),
            session_id: "S1".to_string(),
            user_prompt: None,
            last_response: None,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = TrackingStore::new(dir.path(), Duration::from_secs(1800));
        let key = TrackingKey::new("WH", "S1", "fix-links");
        store.insert(key.clone(), sample_record("m1")).unwrap();

        assert_eq!(store.get(&key).unwrap().message_id, "m1");
        assert!(dir.path().join("WH_S1_fix-links_tracking.json").exists());
    }

    #[test]
    fn restore_from_disk_repopulates_memory_map() {
        let dir = tempdir().unwrap();
        {
            let store = TrackingStore::new(dir.path(), Duration::from_secs(1800));
            let key = TrackingKey::new("WH", "S1", "fix-links");
            store.insert(key, sample_record("m1")).unwrap();
        }

        let store = TrackingStore::new(dir.path(), Duration::from_secs(1800));
        assert_eq!(store.restore_from_disk().unwrap(), 1);
        let key = TrackingKey::new("WH", "S1", "fix-links");
        assert_eq!(store.get(&key).unwrap().message_id, "m1");
    }

    #[test]
    fn remove_deletes_memory_and_disk_entry() {
        let dir = tempdir().unwrap();
        let store = TrackingStore::new(dir.path(), Duration::from_secs(1800));
        let key = TrackingKey::new("WH", "S1", "fix-links");
        store.insert(key.clone(), sample_record("m1")).unwrap();

        let removed = store.remove(&key).unwrap();
        assert!(removed.is_some());
        assert!(store.get(&key).is_none());
        assert!(!dir.path().join("WH_S1_fix-links_tracking.json").exists());
    }
}
