// SPDX-License-Identifier: MIT

//! `ojw`: the short-lived half of the two-process bus/worker split (§1, §6, §4.10).
//!
//! Invoked as `ojw <absolute-path-to-selection-or-approval-file>`. Routing between the current
//! `selections/selection_*.json` schema and the legacy `approvals/approval_*.json` schema is by
//! filename prefix only (§4.10): both are read as the same `WorkflowSelection` shape.

use ojb_eventlog::EventLog;
use ojb_registry::WorkflowRegistry;
use ojb_spool::{read_record, WorkflowSelection};
use ojb_worker::{Config, WorkerError};
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ojw: failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ojw exiting with error");
            eprintln!("ojw: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), WorkerError> {
    let path = parse_arg()?;
    tracing::info!(path = %path.display(), "ojw starting");

    let registry = WorkflowRegistry::load(&config.workflow_registry_path())?;
    let event_log = EventLog::new(config.event_log_path());

    let selection = load_selection(&path)?;

    ojb_worker::run_selection(&config, &registry, &selection, &event_log).await?;

    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove consumed selection file");
        }
    }

    tracing::info!("ojw done");
    Ok(())
}

/// Worker's one positional argument: an absolute path to either file (§6).
fn parse_arg() -> Result<PathBuf, WorkerError> {
    let mut args = std::env::args_os().skip(1);
    let raw = args.next().ok_or(WorkerError::MissingArgument)?;
    if args.next().is_some() {
        return Err(WorkerError::MissingArgument);
    }
    Ok(PathBuf::from(raw))
}

/// Both `selection_*.json` and legacy `approval_*.json` are read as `WorkflowSelection` (§4.10);
/// a missing or already-consumed file (race with a TTL sweep or a duplicate invocation) is a
/// startup error, not silently ignored, since there is no other workflow to fall back to.
fn load_selection(path: &PathBuf) -> Result<WorkflowSelection, WorkerError> {
    match read_record::<WorkflowSelection>(path) {
        Ok(Some(selection)) => Ok(selection),
        Ok(None) => Err(WorkerError::InputNotFound { path: path.clone() }),
        Err(e) => Err(e.into()),
    }
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("worker.log"));
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
