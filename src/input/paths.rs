//! Expansion of command-line paths into target files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extension used for backup copies; never picked up as a target.
pub const BACKUP_EXTENSION: &str = "bak";

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn is_backup(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == BACKUP_EXTENSION)
}

/// Expand `paths` into the list of files to process.
///
/// Files are passed through unchanged, including paths that do not exist,
/// so each one still gets its own (failed) report. Directories contribute
/// the regular files directly inside them, or every file below them when
/// `recursive` is set. Hidden entries and backup copies are skipped.
/// Directory contents are sorted by name.
#[must_use]
pub fn expand_targets(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut targets = Vec::new();

    for path in paths {
        if !path.is_dir() {
            targets.push(path.clone());
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(path)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && !is_backup(entry.path()) => {
                    targets.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable entry under {}: {}", path.display(), e),
            }
        }
    }

    log::debug!("Expanded {} argument(s) into {} target(s)", paths.len(), targets.len());
    targets
}
