use anyhow::Result;
use std::path::{Path, PathBuf};

pub mod external;
pub mod zip;

/// One installation folder that goes into an archive.
#[derive(Debug, Clone)]
pub struct SourceFolder {
    /// Folder name, used as the top-level entry prefix.
    pub name: String,
    pub path: PathBuf,
    /// Files selected for packaging, after skip patterns.
    pub files: Vec<PathBuf>,
}

/// A single archive to produce.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    /// Folder name in per-folder mode, the archive file name in combined mode.
    pub label: String,
    pub output: PathBuf,
    pub sources: Vec<SourceFolder>,
}

impl ArchiveJob {
    pub fn file_count(&self) -> usize {
        self.sources.iter().map(|s| s.files.len()).sum()
    }

    pub fn all_files(&self) -> Vec<PathBuf> {
        self.sources
            .iter()
            .flat_map(|s| s.files.iter().cloned())
            .collect()
    }
}

/// What an archiver wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub bytes: u64,
}

/// Produces one archive per call. Implementations must not leave a partial
/// archive at `job.output` when they fail.
pub trait Archiver {
    fn name(&self) -> &str;

    fn archive(&self, job: &ArchiveJob) -> Result<ArchiveStats>;
}

/// Entry name inside the archive: `<folder>/<path relative to folder>`, `/`-separated.
pub fn entry_name(folder: &str, folder_path: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(folder_path).unwrap_or(file);
    let mut name = folder.to_string();
    for component in rel.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}
