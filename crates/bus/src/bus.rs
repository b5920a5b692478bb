// SPDX-License-Identifier: MIT

//! The Bus: process-wide state and the single-threaded cooperative event loop (§4.8, §9).

use crate::callback::CallbackMap;
use crate::config::Config;
use crate::dedup::DedupStore;
use crate::tracking::TrackingStore;
use ojb_core::Clock;
use ojb_eventlog::EventLog;
use ojb_registry::{WorkflowRegistry, WorkspaceRegistry};
use ojb_spool::SessionSummary;
use ojb_transport::{ChatAdapter, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::signal;

/// Process-wide state for one Bus instance (§9: "process-wide state with lifecycle"). Mutated
/// only on the event-loop thread; `parking_lot::Mutex` is used purely for `Send`/`Sync`
/// bookkeeping across `.await` points, never for cross-thread contention (§4.8).
pub struct Bus<T: Transport, C: Clock> {
    pub config: Config,
    pub workflow_registry: WorkflowRegistry,
    pub workspace_registry: WorkspaceRegistry,
    pub callbacks: CallbackMap,
    pub dedup: DedupStore,
    pub tracking: TrackingStore,
    pub summaries: Mutex<HashMap<(String, String), SessionSummary>>,
    pub adapter: ChatAdapter<T, C>,
    pub event_log: EventLog,
    clock: C,
    activity: Mutex<Instant>,
    shutdown: AtomicBool,
    fatal: AtomicBool,
}

impl<T: Transport, C: Clock> Bus<T, C> {
    pub fn new(
        config: Config,
        workflow_registry: WorkflowRegistry,
        workspace_registry: WorkspaceRegistry,
        transport: T,
        clock: C,
    ) -> Self {
        let callbacks = CallbackMap::new(config.callbacks_dir(), crate::config::STATE_TTL, crate::config::MAX_CALLBACK_FILES);
        let dedup = DedupStore::new(config.dedup_dir(), crate::config::DEDUP_TTL);
        let tracking = TrackingStore::new(config.tracking_dir(), crate::config::TRACKING_TTL);
        let event_log = EventLog::new(config.event_log_path());
        let adapter = ChatAdapter::new(transport, clock.clone());
        let now = clock.now();

        Self {
            config,
            workflow_registry,
            workspace_registry,
            callbacks,
            dedup,
            tracking,
            summaries: Mutex::new(HashMap::new()),
            adapter,
            event_log,
            clock,
            activity: Mutex::new(now),
            shutdown: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
        }
    }

    pub fn touch_activity(&self) {
        *self.activity.lock() = self.clock.now();
    }

    pub fn idle_elapsed(&self) -> std::time::Duration {
        self.clock.now().duration_since(*self.activity.lock())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Marks the loop for a fail-fast exit on an event-log write failure (§4.11, §7: "logging
    /// failures propagate to the caller... never silently dropped"). The scanners themselves have
    /// no `Result`-returning path back to `main`, so a failed append sets this flag in addition to
    /// requesting shutdown; `main` checks it after `run()` returns to pick the process exit code.
    pub(crate) fn mark_fatal(&self) {
        self.fatal.store(true, Ordering::SeqCst);
        self.request_shutdown();
    }

    /// Whether the loop exited because of an unrecoverable error rather than idle/signal shutdown.
    pub fn had_fatal_error(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    pub fn now_iso(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Detached Worker invocation (§4.8, §5): spawned fire-and-forget, stdio redirected to the
    /// bus log, with a background task reaping the exit status so it never becomes a zombie.
    pub fn spawn_worker(&self, selection_or_approval_path: &Path) {
        let binary = worker_binary_path();
        let arg = selection_or_approval_path.to_path_buf();
        let log_path = self.config.log_path();

        tokio::spawn(async move {
            let log_file = match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::error!(error = %e, "failed to open bus log for worker stdio redirect");
                    return;
                }
            };
            let log_file_err = match log_file.try_clone() {
                Ok(file) => file,
                Err(e) => {
                    tracing::error!(error = %e, "failed to clone log file handle");
                    return;
                }
            };

            let spawned = tokio::process::Command::new(&binary)
                .arg(&arg)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::from(log_file))
                .stderr(std::process::Stdio::from(log_file_err))
                .spawn();

            match spawned {
                Ok(mut child) => match child.wait().await {
                    Ok(status) => tracing::info!(?status, path = %arg.display(), "worker exited"),
                    Err(e) => tracing::warn!(error = %e, path = %arg.display(), "failed to await worker exit"),
                },
                Err(e) => tracing::error!(error = %e, binary = %binary.display(), "failed to spawn worker"),
            }
        });
    }
}

impl<T: Transport, C: Clock> Bus<T, C> {
    /// The cooperative event loop (§4.8): one `tokio::select!` over the three scanners'
    /// intervals, the inbound-callback poll, the idle timer, and `SIGINT`/`SIGTERM`, all on a
    /// single task. No scanner ever awaits another's completion; ticks that fire together within
    /// one `select!` iteration simply run in the order `select!` happens to poll them.
    pub async fn run(&self) {
        self.drain_at_startup().await;

        let mut menu_tick = tokio::time::interval(crate::config::MENU_SCAN_INTERVAL);
        let mut progress_tick = tokio::time::interval(crate::config::PROGRESS_SCAN_INTERVAL);
        let mut execution_tick = tokio::time::interval(crate::config::EXECUTION_SCAN_INTERVAL);
        let mut idle_tick = tokio::time::interval(crate::config::IDLE_CHECK_INTERVAL);
        let mut callback_tick = tokio::time::interval(std::time::Duration::from_secs(1));
        let mut sweep_tick = tokio::time::interval(crate::config::TRACKING_TTL);

        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .inspect_err(|e| tracing::error!(error = %e, "failed to install SIGTERM handler, continuing without it"))
            .ok();
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .inspect_err(|e| tracing::error!(error = %e, "failed to install SIGINT handler, continuing without it"))
            .ok();

        loop {
            if self.should_shutdown() {
                tracing::info!("shutdown requested, exiting event loop");
                return;
            }

            tokio::select! {
                _ = menu_tick.tick() => self.scan_summaries().await,
                _ = progress_tick.tick() => self.scan_progress().await,
                _ = execution_tick.tick() => self.scan_executions().await,
                _ = idle_tick.tick() => self.check_idle(),
                _ = callback_tick.tick() => self.poll_callbacks().await,
                _ = sweep_tick.tick() => self.run_ttl_sweeps(),
                _ = recv_or_pending(&mut sigterm) => {
                    tracing::info!("received SIGTERM, shutting down");
                    self.request_shutdown();
                }
                _ = recv_or_pending(&mut sigint) => {
                    tracing::info!("received SIGINT, shutting down");
                    self.request_shutdown();
                }
            }
        }
    }

    async fn poll_callbacks(&self) {
        match self.adapter.poll_updates().await {
            Ok(events) => {
                for event in events {
                    self.handle_callback(event).await;
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to poll for inbound callback events"),
        }
    }

    /// Background TTL sweeps over `callbacks/`, `dedup/`, and `tracking/` (§4.1, §4.3, §3).
    fn run_ttl_sweeps(&self) {
        match self.callbacks.sweep() {
            Ok(n) if n > 0 => tracing::debug!(removed = n, "swept expired callback tokens"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "callback sweep failed"),
        }
        match self.dedup.sweep_expired() {
            Ok(n) if n > 0 => tracing::debug!(removed = n, "swept expired dedup entries"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "dedup sweep failed"),
        }
        match self.tracking.sweep_expired() {
            Ok(n) if n > 0 => tracing::debug!(removed = n, "swept expired tracking records"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "tracking sweep failed"),
        }
    }
}

/// Await the next signal on `handle` if the handler installed successfully; a handler that
/// failed to install (`None`) never fires, so its branch in `run`'s `select!` is effectively
/// disabled rather than busy-looping or panicking.
async fn recv_or_pending(handle: &mut Option<signal::unix::Signal>) {
    match handle {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}

fn worker_binary_path() -> std::path::PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("ojw");
            if candidate.exists() {
                return candidate;
            }
        }
    }
    std::path::PathBuf::from("ojw")
}
