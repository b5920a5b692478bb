// SPDX-License-Identifier: MIT

//! Workflow registry: manifest schema, loading, and the trigger filter (§3, §4.4).

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Which condition, if any, gates inclusion of a manifest in the menu.
///
/// Exactly one of the three is honored per manifest, in the fixed priority order
/// `lychee_errors > git_modified > always`; later fields are ignored once an earlier one is
/// present (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Triggers {
    #[serde(default)]
    pub lychee_errors: Option<bool>,
    #[serde(default)]
    pub git_modified: Option<bool>,
    #[serde(default)]
    pub always: Option<bool>,
}

/// A single named workflow a user can launch from the menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowManifest {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub estimated_duration: String,
    pub triggers: Triggers,
    pub prompt_template: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// `{version, workflows: map<workflow_id, WorkflowManifest>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRegistry {
    pub version: String,
    pub workflows: BTreeMap<String, WorkflowManifest>,
}

impl WorkflowRegistry {
    /// Load and schema-validate the registry from disk. Fails fast on malformed JSON; both
    /// `ojb` and `ojw` treat this as an unrecoverable startup error (§7).
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| RegistryError::Io { path: path.to_path_buf(), source })?;
        let registry: WorkflowRegistry = serde_json::from_str(&content)
            .map_err(|source| RegistryError::Malformed { path: path.to_path_buf(), source })?;
        registry.validate()?;
        Ok(registry)
    }

    /// Reject manifests that declare no trigger at all — such a manifest can never appear on a
    /// menu and almost certainly indicates an authoring mistake (§4.4 only recognizes the three
    /// known trigger kinds; this is a registry-load-time sanity check, not itself a trigger).
    fn validate(&self) -> Result<(), RegistryError> {
        for (workflow_id, manifest) in &self.workflows {
            let t = &manifest.triggers;
            if t.lychee_errors.is_none() && t.git_modified.is_none() && t.always.is_none() {
                return Err(RegistryError::NoTrigger { workflow_id: workflow_id.clone() });
            }
        }
        Ok(())
    }

    /// True if any requested workflow id declares a non-empty `dependencies` list (§4.10: used
    /// to decide whether the Worker should log its once-per-invocation ordering warning).
    pub fn any_declares_dependencies(&self, workflow_ids: &[String]) -> bool {
        workflow_ids.iter().any(|id| {
            self.workflows.get(id).map(|m| !m.dependencies.is_empty()).unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_registry(path: &Path, json: &str) {
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn load_parses_a_valid_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflows.json");
        write_registry(
            &path,
            r#"{
                "version": "1",
                "workflows": {
                    "fix-links": {
                        "name": "Fix broken links",
                        "triggers": {"lychee_errors": true},
                        "prompt_template": "fix ${lychee_status.error_count} links"
                    }
                }
            }"#,
        );

        let registry = WorkflowRegistry::load(&path).unwrap();
        assert_eq!(registry.version, "1");
        assert!(registry.workflows.contains_key("fix-links"));
    }

    #[test]
    fn load_rejects_manifest_with_no_trigger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflows.json");
        write_registry(
            &path,
            r#"{
                "version": "1",
                "workflows": {
                    "no-trigger": {
                        "name": "Orphan",
                        "triggers": {},
                        "prompt_template": "x"
                    }
                }
            }"#,
        );

        let err = WorkflowRegistry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::NoTrigger { .. }));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflows.json");
        write_registry(&path, "{not json");
        assert!(matches!(WorkflowRegistry::load(&path), Err(RegistryError::Malformed { .. })));
    }

    #[test]
    fn any_declares_dependencies_is_true_only_when_requested_workflow_has_some() {
        let mut workflows = BTreeMap::new();
        workflows.insert(
            "b".to_string(),
            WorkflowManifest {
                name: "B".to_string(),
                icon: String::new(),
                category: String::new(),
                risk_level: String::new(),
                estimated_duration: String::new(),
                triggers: Triggers { always: Some(true), ..Default::default() },
                prompt_template: String::new(),
                dependencies: vec!["a".to_string()],
            },
        );
        let registry = WorkflowRegistry { version: "1".to_string(), workflows };

        assert!(registry.any_declares_dependencies(&["b".to_string()]));
        assert!(!registry.any_declares_dependencies(&["missing".to_string()]));
    }
}
