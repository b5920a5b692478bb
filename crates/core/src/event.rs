// SPDX-License-Identifier: MIT

//! Event-log record types (§4.11 of the design spec).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which process emitted an event-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Bus,
    Worker,
}

/// A single append-only event-log entry.
///
/// Event names are hierarchical strings (`bot.started`, `claude_cli.timeout`, ...); this type
/// does not enumerate them as a closed set so new event names can be added without a schema
/// migration — the event log is for tracing, not for replaying state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub component: Component,
    pub event_type: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub metadata: Value,
}

impl EventRecord {
    pub fn new(
        correlation_id: impl Into<String>,
        component: Component,
        event_type: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            workspace_id: None,
            session_id: None,
            component,
            event_type: event_type.into(),
            timestamp_ms,
            metadata: Value::Null,
        }
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
