// SPDX-License-Identifier: MIT

//! External assistant subprocess invocation (§4.10): working directory set to the workspace,
//! stdin null, stdout/stderr captured, wait bounded by `CLAUDE_CLI_TIMEOUT`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Outcome of one subprocess invocation, already reduced to the three terminal shapes the
/// execution record distinguishes (§3: `status ∈ {success, error, timeout}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubprocessOutcome {
    Success { exit_code: i32, stdout: String, stderr: String },
    Error { stderr: String },
    Timeout,
}

/// Spawn `bin` with `args`, cwd `workspace_path`, and wait up to `timeout`.
///
/// On timeout the child is killed best-effort (a failure to kill is logged, not propagated —
/// matching the host's reaper task that logs and moves on rather than treating it as a harder
/// error). On any other spawn/wait failure, `Error` carries the exception string as stderr.
pub async fn run(
    bin: &str,
    args: &[String],
    workspace_path: &Path,
    timeout: Duration,
) -> SubprocessOutcome {
    let mut command = tokio::process::Command::new(bin);
    command
        .args(args)
        .current_dir(workspace_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return SubprocessOutcome::Error { stderr: e.to_string() },
    };

    // Drain stdout/stderr concurrently with the wait rather than `wait_with_output()`, which
    // consumes the `Child` by value and would leave us nothing to kill on timeout.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            SubprocessOutcome::Success {
                exit_code: status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }
        }
        Ok(Err(e)) => SubprocessOutcome::Error { stderr: e.to_string() },
        Err(_elapsed) => {
            // Best-effort kill (§4.10): a failure here is logged, not escalated, so the
            // `claude_cli.killed` event still reflects that a kill was attempted.
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill timed-out subprocess");
            }
            stdout_task.abort();
            stderr_task.abort();
            SubprocessOutcome::Timeout
        }
    }
}

/// Canonical timeout message (§4.10): `"Process exceeded {N}-second timeout"`.
pub fn timeout_message(timeout: Duration) -> String {
    format!("Process exceeded {}-second timeout", timeout.as_secs())
}
