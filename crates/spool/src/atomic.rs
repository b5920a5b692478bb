// SPDX-License-Identifier: MIT

use crate::error::SpoolError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `value` as pretty JSON to `path` atomically: serialize, write to a sibling `.tmp`
/// file, fsync, then rename over the final path. Rename is the commit operation (§6).
pub fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), SpoolError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| SpoolError::Io { path: path.to_path_buf(), source })?;
    }

    let json = serde_json::to_vec_pretty(value)
        .map_err(|source| SpoolError::Serialize { path: path.to_path_buf(), source })?;

    let tmp_path = sibling_tmp_path(path);
    {
        let mut file = File::create(&tmp_path)
            .map_err(|source| SpoolError::Io { path: tmp_path.clone(), source })?;
        file.write_all(&json).map_err(|source| SpoolError::Io { path: tmp_path.clone(), source })?;
        file.sync_all().map_err(|source| SpoolError::Io { path: tmp_path.clone(), source })?;
    }

    fs::rename(&tmp_path, path).map_err(|source| SpoolError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
