// SPDX-License-Identifier: MIT

//! Read-only workspace registry: `workspace_id -> {path, emoji, name}` (§3).
//!
//! The registry may not cover every observed path — unregistered paths fall back to a default
//! display and the path's hash used directly as id. Tracking, execution, and progress records
//! always key by hash, never by this registry's own `workspace_id`, so a missing entry never
//! blocks a workflow from running; it only affects how the workspace is displayed.

use ojb_core::workspace_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub path: String,
    #[serde(default)]
    pub emoji: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceRegistry {
    #[serde(flatten)]
    pub entries: BTreeMap<String, WorkspaceEntry>,
}

/// Default display used for a workspace path not covered by the registry.
pub struct WorkspaceDisplay {
    pub emoji: String,
    pub name: String,
}

impl WorkspaceRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|source| RegistryError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| RegistryError::Malformed { path: path.to_path_buf(), source })
    }

    /// Look up display info for an absolute workspace path, falling back to a generic
    /// folder emoji and the hash itself as the name when the path isn't registered.
    pub fn display_for(&self, absolute_path: &PathBuf) -> WorkspaceDisplay {
        let path_str = absolute_path.to_string_lossy().to_string();
        if let Some(entry) = self.entries.values().find(|e| e.path == path_str) {
            return WorkspaceDisplay { emoji: entry.emoji.clone(), name: entry.name.clone() };
        }
        WorkspaceDisplay { emoji: "\u{1f4c1}".to_string(), name: workspace_hash(absolute_path) }
    }
}
