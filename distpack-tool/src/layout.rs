use anyhow::{Context, Result};
use distpack_lib::PackError;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A configured folder and whether it exists under the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderStatus {
    pub name: String,
    pub path: PathBuf,
    pub present: bool,
}

/// Picks the install root.
///
/// The result is always absolute, since external archivers run with the
/// root as their working directory. An explicit path wins. Otherwise the directory holding the executable is
/// used when it contains any of `folders`, falling back to the current
/// directory.
pub fn resolve_root(explicit: Option<&str>, folders: &[String]) -> Result<PathBuf> {
    if let Some(root) = explicit {
        let root = PathBuf::from(root);
        if !root.is_dir() {
            return Err(PackError::InvalidRoot(root).into());
        }
        return std::path::absolute(&root)
            .with_context(|| format!("resolving install root {}", root.display()));
    }

    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        if contains_any(&exe_dir, folders) {
            debug!(root = %exe_dir.display(), "using executable directory as install root");
            return Ok(exe_dir);
        }
    }

    let cwd = env::current_dir().context("reading current directory")?;
    debug!(root = %cwd.display(), "using current directory as install root");
    Ok(cwd)
}

fn contains_any(dir: &Path, folders: &[String]) -> bool {
    folders.iter().any(|f| dir.join(f).is_dir())
}

/// Reports each configured folder, in configured order.
pub fn discover(root: &Path, folders: &[String]) -> Vec<FolderStatus> {
    folders
        .iter()
        .map(|name| {
            let path = root.join(name);
            FolderStatus {
                name: name.clone(),
                present: path.is_dir(),
                path,
            }
        })
        .collect()
}
