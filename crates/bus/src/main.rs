// SPDX-License-Identifier: MIT

//! `ojb`: the long-lived half of the two-process bus/worker split (§1, §9).
//!
//! Startup order mirrors the host daemon's own (`Config::load` → logging → lock → run):
//! resolve configuration, set up logging so even a lock-contention failure is captured, take
//! the PID lock, load the two registries, then hand off to the cooperative event loop.

use ojb_bus::{BusError, Config, TelegramTransport};
use ojb_core::SystemClock;
use ojb_registry::{WorkflowRegistry, WorkspaceRegistry};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ojb: failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = ojb_bus::config::ensure_state_dirs(&config) {
        tracing::error!(error = %e, "failed to create state directories");
        eprintln!("ojb: failed to create state directories: {e}");
        return ExitCode::FAILURE;
    }

    let lock = match ojb_bus::PidLock::acquire(&config.pid_path()) {
        Ok(lock) => lock,
        Err(BusError::AlreadyRunning { pid }) => {
            eprintln!("ojb is already running (pid {pid})");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to acquire pid lock");
            eprintln!("ojb: {e}");
            return ExitCode::FAILURE;
        }
    };

    let workflow_registry = match WorkflowRegistry::load(&config.workflow_registry_path()) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "failed to load workflow registry");
            eprintln!("ojb: failed to load workflow registry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let workspace_registry = match WorkspaceRegistry::load(&config.workspace_registry_path()) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "failed to load workspace registry");
            eprintln!("ojb: failed to load workspace registry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(chat_token) = config.chat_token.clone() else {
        eprintln!("ojb: OJB_CHAT_TOKEN must be set");
        return ExitCode::FAILURE;
    };

    tracing::info!(pid = std::process::id(), "ojb starting");

    let transport = TelegramTransport::new(&chat_token);
    let bus = ojb_bus::Bus::new(config, workflow_registry, workspace_registry, transport, SystemClock);

    bus.run().await;
    let fatal = bus.had_fatal_error();
    drop(lock);

    if fatal {
        tracing::error!("ojb stopped after an unrecoverable event-log failure");
        return ExitCode::FAILURE;
    }
    tracing::info!("ojb stopped");
    ExitCode::SUCCESS
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("bot.log"));
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
