//! Backup copies made before a target is rewritten.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DedupError;
use crate::input::paths::BACKUP_EXTENSION;

/// Path of the backup copy for `target` (`notes.txt` -> `notes.txt.bak`).
#[must_use]
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(OsString::from(format!(".{BACKUP_EXTENSION}")));
    PathBuf::from(name)
}

/// Copy `target` to its backup path, overwriting an older backup.
///
/// # Errors
///
/// Returns [`DedupError::OutputWriteFailure`] if the copy fails.
pub fn create_backup(target: &Path) -> Result<PathBuf, DedupError> {
    let backup = backup_path(target);
    fs::copy(target, &backup).map_err(|source| DedupError::OutputWriteFailure {
        path: backup.clone(),
        source,
    })?;
    log::info!("Created backup: {}", backup.display());
    Ok(backup)
}
