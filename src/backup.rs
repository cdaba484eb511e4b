//! Backup-preserving file replacement

use crate::error::Result;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `song.mid` -> `song.mid.backup`
pub fn appended_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// `song.mid` -> `song.original.mid`
pub fn original_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(".original");
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".tmp");
    target.with_file_name(name)
}

/// Replace `target` with `data`.
///
/// When `backup` is given and the target exists, it is copied there before
/// anything is written. The new content goes to a sibling temporary file that
/// is then renamed over the target.
pub fn write_with_backup(target: &Path, data: &[u8], backup: Option<&Path>) -> Result<()> {
    if let Some(backup) = backup {
        if target.exists() {
            fs::copy(target, backup)?;
            debug!("Backed up {} to {}", target.display(), backup.display());
        }
    }

    let tmp = temp_path(target);
    fs::write(&tmp, data)?;
    if let Err(e) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
