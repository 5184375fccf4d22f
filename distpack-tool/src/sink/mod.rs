use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod save_file;

pub use save_file::create_file_writer;

/// Temporary sibling an archive is written to before it is committed.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("archive"));
    name.push(".part");
    path.with_file_name(name)
}

/// Moves a finished part file over the final archive path.
pub fn commit(part: &Path, path: &Path) -> Result<()> {
    fs::rename(part, path)
        .with_context(|| format!("moving {} to {}", part.display(), path.display()))
}

/// Removes a part file left behind by a failed write.
pub fn discard(part: &Path) {
    if part.exists() {
        if let Err(e) = fs::remove_file(part) {
            warn!(path = %part.display(), error = %e, "could not remove partial archive");
        }
    }
}

/// Creates parent directories of `path` and removes a stale file at `path`.
pub fn prepare_output(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    if path.is_file() {
        fs::remove_file(path)
            .with_context(|| format!("removing previous archive {}", path.display()))?;
    }
    Ok(())
}
