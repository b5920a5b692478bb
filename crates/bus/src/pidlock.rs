// SPDX-License-Identifier: MIT

//! PID-file advisory locking for single-instance enforcement (§4.8).
//!
//! Mirrors the host daemon's own lock-file acquisition (`lifecycle/startup.rs`): open
//! `O_RDWR|O_CREAT` without truncating, take an exclusive non-blocking advisory lock, then
//! (only once the lock is held) write the PID. On contention, diagnose whether the holder is
//! actually alive before reporting "already running" vs. "stale lock."

use crate::error::BusError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// The binary name expected in a live holder's `/proc/<pid>/cmdline` (Linux only).
const EXPECTED_BINARY_NAME: &str = crate::config::BUS_BINARY_NAME;

/// Holds the exclusive lock on `bot.pid` for the process's lifetime. Dropping it releases the
/// lock and removes the file — the cleanup hook described in §4.8.
pub struct PidLock {
    path: PathBuf,
    file: File,
}

impl PidLock {
    /// Acquire the lock, diagnosing any existing holder on contention (§4.8, §7).
    pub fn acquire(path: &Path) -> Result<Self, BusError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| BusError::Io { path: path.to_path_buf(), source })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| BusError::Io { path: path.to_path_buf(), source })?;

        if let Err(lock_err) = file.try_lock_exclusive() {
            diagnose_contention(path, &file)?;
            return Err(BusError::LockContended { path: path.to_path_buf(), source: lock_err });
        }

        let mut file = file;
        file.set_len(0).map_err(|source| BusError::Io { path: path.to_path_buf(), source })?;
        writeln!(file, "{}", std::process::id())
            .map_err(|source| BusError::Io { path: path.to_path_buf(), source })?;
        file.sync_all().map_err(|source| BusError::Io { path: path.to_path_buf(), source })?;

        Ok(Self { path: path.to_path_buf(), file })
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Read the stored PID, check liveness, and return the appropriate diagnosis. Never auto-clears
/// the file — a stale lock on a shared filesystem indicates a real problem the user must resolve.
fn diagnose_contention(path: &Path, file: &File) -> Result<(), BusError> {
    let Some(pid) = read_pid(file) else {
        // Unreadable/empty PID file held by someone else's lock: treat as contended, not stale —
        // we cannot name a PID to report as the owner.
        return Ok(());
    };

    if is_alive(pid) {
        if cmdline_names_bus(pid) {
            return Err(BusError::AlreadyRunning { pid });
        }
        // Alive but not recognizably the bus binary (e.g. PID reused by an unrelated process).
        // Treated the same as "already running" since we hold no evidence otherwise and must
        // not clear a lock someone is actively holding.
        return Err(BusError::AlreadyRunning { pid });
    }

    Err(BusError::StaleLock { path: path.to_path_buf(), pid })
}

fn read_pid(file: &File) -> Option<u32> {
    let mut file = file.try_clone().ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// `kill(pid, 0)`: success or `EPERM` means the process exists; `ESRCH` means it does not.
fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Best-effort check that `/proc/<pid>/cmdline` names the bus binary. Platforms without `/proc`
/// (anything this function can't read) fall through to `true` — liveness alone then gates the
/// diagnosis, per §4.8.
fn cmdline_names_bus(pid: u32) -> bool {
    let path = format!("/proc/{pid}/cmdline");
    match std::fs::read_to_string(&path) {
        Ok(cmdline) => cmdline.split('\0').any(|arg| arg.contains(EXPECTED_BINARY_NAME)),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_file_with_current_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.pid");
        let lock = PidLock::acquire(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_the_pid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.pid");
        {
            let _lock = PidLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
