// SPDX-License-Identifier: MIT

//! Centralized environment variable access and on-disk layout resolution for the bus (§6).
//!
//! Mirrors the host daemon crate's `env.rs` module: every environment variable this process
//! reads is resolved through one function here rather than scattered `std::env::var` calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default idle-shutdown threshold (§4.8): 30 minutes without activity.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default callback-token TTL (§4.2): 5 minutes.
pub const STATE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default tracking-record TTL (§3): 30 minutes.
pub const TRACKING_TTL: Duration = Duration::from_secs(30 * 60);

/// Default dedup-entry TTL (§4.3): 30 minutes.
pub const DEDUP_TTL: Duration = Duration::from_secs(30 * 60);

/// Cap on files retained in `callbacks/` before the TTL sweep trims the oldest (§4.1).
pub const MAX_CALLBACK_FILES: usize = 1000;

/// Poll interval for the menu/notification scanner (§4.8).
pub const MENU_SCAN_INTERVAL: Duration = Duration::from_secs(5);
/// Poll interval for the progress scanner (§4.8).
pub const PROGRESS_SCAN_INTERVAL: Duration = Duration::from_secs(2);
/// Poll interval for the execution scanner (§4.8).
pub const EXECUTION_SCAN_INTERVAL: Duration = Duration::from_secs(5);
/// Interval at which the idle timer re-evaluates activity (§4.8).
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Resolved on-disk layout and runtime parameters for one bus instance (§6).
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub chat_token: Option<String>,
    pub chat_id: Option<String>,
    pub correlation_id: Option<String>,
    pub idle_timeout: Duration,
}

impl Config {
    /// Resolve configuration from the environment (§6): `OJB_STATE_DIR` (default
    /// `~/.oddjobs-bus`), `OJB_CHAT_TOKEN`, `OJB_CHAT_ID`, `OJB_CORRELATION_ID`,
    /// `OJB_IDLE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self {
            state_dir: state_dir(),
            chat_token: std::env::var("OJB_CHAT_TOKEN").ok().filter(|s| !s.is_empty()),
            chat_id: std::env::var("OJB_CHAT_ID").ok().filter(|s| !s.is_empty()),
            correlation_id: std::env::var("OJB_CORRELATION_ID").ok().filter(|s| !s.is_empty()),
            idle_timeout: idle_timeout(),
        }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("bot.pid")
    }
    pub fn workflow_registry_path(&self) -> PathBuf {
        self.state_dir.join("workflows.json")
    }
    pub fn workspace_registry_path(&self) -> PathBuf {
        self.state_dir.join("registry.json")
    }
    pub fn event_log_path(&self) -> PathBuf {
        self.state_dir.join("events.db")
    }
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("bot.log")
    }
    pub fn anti_feedback_marker_path(&self) -> PathBuf {
        self.state_dir.join("autofix-in-progress.json")
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }
    pub fn summaries_dir(&self) -> PathBuf {
        self.dir("summaries")
    }
    pub fn selections_dir(&self) -> PathBuf {
        self.dir("selections")
    }
    pub fn executions_dir(&self) -> PathBuf {
        self.dir("executions")
    }
    pub fn progress_dir(&self) -> PathBuf {
        self.dir("progress")
    }
    pub fn tracking_dir(&self) -> PathBuf {
        self.dir("tracking")
    }
    pub fn dedup_dir(&self) -> PathBuf {
        self.dir("dedup")
    }
    pub fn callbacks_dir(&self) -> PathBuf {
        self.dir("callbacks")
    }
    pub fn notifications_dir(&self) -> PathBuf {
        self.dir("notifications")
    }
    pub fn approvals_dir(&self) -> PathBuf {
        self.dir("approvals")
    }
    pub fn completions_dir(&self) -> PathBuf {
        self.dir("completions")
    }
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJB_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".oddjobs-bus")
}

fn idle_timeout() -> Duration {
    std::env::var("OJB_IDLE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_IDLE_TIMEOUT)
}

/// The expected binary name checked against a live PID's command line at startup (§4.8).
pub const BUS_BINARY_NAME: &str = "ojb";

/// Whether `path` is a directory we expect to create under the state dir.
pub fn ensure_state_dirs(config: &Config) -> std::io::Result<()> {
    for dir in [
        config.summaries_dir(),
        config.selections_dir(),
        config.executions_dir(),
        config.progress_dir(),
        config.tracking_dir(),
        config.dedup_dir(),
        config.callbacks_dir(),
        config.notifications_dir(),
        config.approvals_dir(),
        config.completions_dir(),
    ] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}
