// SPDX-License-Identifier: MIT

//! Content-hash dedup store (§4.3).
//!
//! Every candidate outbound edit is hashed and compared against the stored hash for its
//! `(workspace, session, workflow)` key before the transport is ever called. The in-memory
//! cache is not eagerly warmed at startup — only a TTL sweep runs eagerly — so a lookup miss
//! falls back to reading `dedup/<hash16>.hash` from disk and promotes the result into the cache.

use ojb_core::short_hash;
use ojb_spool::{file_age, sweep_ttl, SpoolError};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub struct DedupStore {
    dir: PathBuf,
    ttl: Duration,
    cache: Mutex<HashMap<String, String>>,
}

impl DedupStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl, cache: Mutex::new(HashMap::new()) }
    }

    /// Key for the `(workspace, session, workflow)` tuple: first 16 hex chars of
    /// `sha256("{workspace_id}_{session_id}_{workflow_id}")` (§3).
    pub fn key(workspace_id: &str, session_id: &str, workflow_id: &str) -> String {
        short_hash(&format!("{workspace_id}_{session_id}_{workflow_id}"), 8)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.hash"))
    }

    /// True if `text`'s hash equals the stored hash for `key` — i.e. the edit would be a no-op
    /// and must be skipped without a transport call.
    pub fn is_duplicate(&self, key: &str, text: &str) -> bool {
        let candidate = hash_text(text);
        self.lookup(key).as_deref() == Some(candidate.as_str())
    }

    /// Persist `text`'s hash for `key` after a successful send (memory + disk, atomic write).
    pub fn record_sent(&self, key: &str, text: &str) -> Result<(), SpoolError> {
        let hash = hash_text(text);
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| SpoolError::Io { path: self.dir.clone(), source })?;
        let path = self.entry_path(key);
        std::fs::write(&path, &hash).map_err(|source| SpoolError::Io { path, source })?;
        self.cache.lock().insert(key.to_string(), hash);
        Ok(())
    }

    /// Clear an entry (memory + disk) on workflow completion.
    pub fn clear(&self, key: &str) {
        self.cache.lock().remove(key);
        let path = self.entry_path(key);
        let _ = std::fs::remove_file(path);
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(hash) = self.cache.lock().get(key).cloned() {
            return Some(hash);
        }
        let path = self.entry_path(key);
        let age = file_age(&path).ok()?;
        if age > self.ttl {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        let hash = std::fs::read_to_string(&path).ok()?;
        self.cache.lock().insert(key.to_string(), hash.clone());
        Some(hash)
    }

    /// Eagerly sweep expired entries (startup, §4.3) without warming the in-memory cache.
    pub fn sweep_expired(&self) -> std::io::Result<usize> {
        sweep_ttl(&self.dir, self.ttl, usize::MAX)
    }
}

fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
