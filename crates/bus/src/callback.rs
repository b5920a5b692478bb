// SPDX-License-Identifier: MIT

//! Callback-token map (§4.2): compresses arbitrary context into a short token for chat
//! transports with inline-button payload limits.

use crate::error::CallbackError;
use ojb_core::short_hash;
use ojb_spool::{file_age, sweep_ttl, write_json_atomic, CallbackToken, SpoolError};
use std::path::PathBuf;
use std::time::Duration;

pub struct CallbackMap {
    dir: PathBuf,
    ttl: Duration,
    max_files: usize,
}

impl CallbackMap {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, max_files: usize) -> Self {
        Self { dir: dir.into(), ttl, max_files }
    }

    fn path_for(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{token}.json"))
    }

    /// `create_callback_data`: canonicalize `ctx` to sorted-key JSON, hash it, write
    /// `cb_<hash>.json`, return the token (§4.2, §3).
    pub fn create(&self, ctx: &CallbackToken) -> Result<String, SpoolError> {
        let canonical = canonical_json(ctx);
        let token = format!("cb_{}", short_hash(&canonical, 4));
        write_json_atomic(self.path_for(&token), ctx)?;
        Ok(token)
    }

    /// `resolve_callback_data`: read the file; missing or aged past `STATE_TTL` resolves to the
    /// distinct `NotFound`/`Expired` variants (the router reports both as "expired" to the user,
    /// but the event log preserves which happened — §4.2).
    pub fn resolve(&self, token: &str) -> Result<CallbackToken, CallbackError> {
        let path = self.path_for(token);
        let age = file_age(&path).map_err(|_| CallbackError::NotFound)?;
        if age > self.ttl {
            let _ = std::fs::remove_file(&path);
            return Err(CallbackError::Expired);
        }
        let content = std::fs::read_to_string(&path).map_err(|_| CallbackError::NotFound)?;
        let parsed: CallbackToken = serde_json::from_str(&content).map_err(|_| CallbackError::NotFound)?;
        let _ = std::fs::remove_file(&path);
        Ok(parsed)
    }

    /// TTL + max-file sweep (§4.1): entries older than `STATE_TTL`, then oldest survivors beyond
    /// `MAX_FILES`.
    pub fn sweep(&self) -> std::io::Result<usize> {
        sweep_ttl(&self.dir, self.ttl, self.max_files)
    }
}

/// Sorted-key JSON serialization of the callback context, used as the hash input (§4.2).
fn canonical_json(ctx: &CallbackToken) -> String {
    serde_json::json!({
        "action": ctx.action,
        "correlation_id": ctx.correlation_id,
        "session_id": ctx.session_id,
        "timestamp": ctx.timestamp,
        "workspace_id": ctx.workspace_id,
        "workspace_path": ctx.workspace_path,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_ctx(action: &str) -> CallbackToken {
        CallbackToken {
            workspace_id: "WH".to_string(),
            workspace_path: "/w".to_string(),
            session_id: "S1".to_string(),
            action: action.to_string(),
            correlation_id: "C1".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn create_then_resolve_round_trips_within_ttl() {
        let dir = tempdir().unwrap();
        let map = CallbackMap::new(dir.path(), Duration::from_secs(300), 1000);
        let ctx = sample_ctx("workflow_fix-links");

        let token = map.create(&ctx).unwrap();
        assert!(token.starts_with("cb_"));
        let resolved = map.resolve(&token).unwrap();
        assert_eq!(resolved, ctx);
    }

    #[test]
    fn resolve_unknown_token_is_not_found() {
        let dir = tempdir().unwrap();
        let map = CallbackMap::new(dir.path(), Duration::from_secs(300), 1000);
        assert_eq!(map.resolve("cb_deadbeef").unwrap_err(), CallbackError::NotFound);
    }

    #[test]
    fn resolve_deletes_the_token_file() {
        let dir = tempdir().unwrap();
        let map = CallbackMap::new(dir.path(), Duration::from_secs(300), 1000);
        let token = map.create(&sample_ctx("reject")).unwrap();

        map.resolve(&token).unwrap();
        assert!(map.resolve(&token).is_err());
    }
}
