// SPDX-License-Identifier: MIT

//! Centralized environment variable access and on-disk layout resolution for the Worker (§6).
//!
//! Worker is a short-lived process: it resolves its configuration once at entry and never
//! re-reads the environment. Mirrors `ojb-bus`'s `config.rs` so the two processes agree on the
//! state-directory layout without either depending on the other's crate.

use std::path::PathBuf;
use std::time::Duration;

/// Default bound on the external assistant subprocess (§4.10), overridable via
/// `CLAUDE_CLI_TIMEOUT` (seconds).
pub const DEFAULT_CLAUDE_CLI_TIMEOUT: Duration = Duration::from_secs(300);

/// Default external assistant binary, overridable via `CLAUDE_CLI_BIN`.
pub const DEFAULT_CLAUDE_CLI_BIN: &str = "claude";

/// Resolved on-disk layout and runtime parameters for one Worker invocation (§6).
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub correlation_id: Option<String>,
    pub claude_cli_timeout: Duration,
    pub claude_cli_bin: String,
}

impl Config {
    /// Resolve configuration from the environment: `OJB_STATE_DIR` (default
    /// `~/.oddjobs-bus`), `OJB_CORRELATION_ID`, `CLAUDE_CLI_TIMEOUT`, `CLAUDE_CLI_BIN`.
    pub fn from_env() -> Self {
        Self {
            state_dir: state_dir(),
            correlation_id: std::env::var("OJB_CORRELATION_ID").ok().filter(|s| !s.is_empty()),
            claude_cli_timeout: claude_cli_timeout(),
            claude_cli_bin: std::env::var("CLAUDE_CLI_BIN")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CLAUDE_CLI_BIN.to_string()),
        }
    }

    pub fn workflow_registry_path(&self) -> PathBuf {
        self.state_dir.join("workflows.json")
    }
    pub fn event_log_path(&self) -> PathBuf {
        self.state_dir.join("events.db")
    }
    pub fn anti_feedback_marker_path(&self) -> PathBuf {
        self.state_dir.join("autofix-in-progress.json")
    }
    /// Worker logs to its own file rather than the bus's `bot.log`: the two processes may run
    /// concurrently and neither should block on the other's file lock.
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("worker.log")
    }
    pub fn selections_dir(&self) -> PathBuf {
        self.dir("selections")
    }
    pub fn approvals_dir(&self) -> PathBuf {
        self.dir("approvals")
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }
    pub fn summaries_dir(&self) -> PathBuf {
        self.dir("summaries")
    }
    pub fn progress_dir(&self) -> PathBuf {
        self.dir("progress")
    }
    pub fn executions_dir(&self) -> PathBuf {
        self.dir("executions")
    }
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJB_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs_home().unwrap_or_else(|| PathBuf::from(".")).join(".oddjobs-bus")
}

/// Deliberately stdlib-only: Worker's one home-directory lookup doesn't justify a `dirs`
/// dependency the bus already pays for elsewhere; `$HOME` covers every platform this bus targets.
fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn claude_cli_timeout() -> Duration {
    std::env::var("CLAUDE_CLI_TIMEOUT")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CLAUDE_CLI_TIMEOUT)
}
