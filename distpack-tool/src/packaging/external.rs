use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use super::{ArchiveJob, ArchiveStats, Archiver};
use crate::fs_utils::total_size;
use crate::shell_exec::execute_and_stream;
use crate::sink;

/// Placeholder replaced by the archive path.
pub const ARCHIVE_PLACEHOLDER: &str = "{archive}";
/// Placeholder replaced by one argument per source folder.
pub const SOURCES_PLACEHOLDER: &str = "{sources}";
/// Placeholder replaced by the install root.
pub const ROOT_PLACEHOLDER: &str = "{root}";

/// Third-party archiver invoked once per job, e.g.
/// `7z a -tzip {archive} {sources}`. Runs inside the install root so source
/// folders are passed by name and stored without the root prefix.
pub struct ExternalArchiver {
    command: Vec<String>,
    root: PathBuf,
}

impl ExternalArchiver {
    pub fn new(command: Vec<String>, root: PathBuf) -> Result<Self> {
        if command.first().is_none_or(|p| p.trim().is_empty()) {
            anyhow::bail!("external archiver command is empty");
        }
        let root = std::path::absolute(&root)
            .with_context(|| format!("resolving install root {}", root.display()))?;
        Ok(Self { command, root })
    }

    /// Expands placeholders for `job`. A `{sources}` argument on its own
    /// becomes several arguments; embedded in a longer argument it is
    /// replaced by the space-joined folder names.
    ///
    /// The archive path is made absolute first: the archiver runs inside the
    /// root and would otherwise resolve a relative path against it again.
    pub fn expand_args(&self, job: &ArchiveJob) -> Result<Vec<String>> {
        let archive = std::path::absolute(&job.output)
            .with_context(|| format!("resolving archive path {}", job.output.display()))?
            .to_string_lossy()
            .to_string();
        let root = self.root.to_string_lossy().to_string();
        let names: Vec<String> = job.sources.iter().map(|s| s.name.clone()).collect();

        let mut args = Vec::new();
        for arg in &self.command[1..] {
            if arg == SOURCES_PLACEHOLDER {
                args.extend(names.iter().cloned());
                continue;
            }
            args.push(
                arg.replace(ARCHIVE_PLACEHOLDER, &archive)
                    .replace(ROOT_PLACEHOLDER, &root)
                    .replace(SOURCES_PLACEHOLDER, &names.join(" ")),
            );
        }
        Ok(args)
    }
}

impl Archiver for ExternalArchiver {
    fn name(&self) -> &str {
        &self.command[0]
    }

    fn archive(&self, job: &ArchiveJob) -> Result<ArchiveStats> {
        // Archivers such as 7z append to an existing archive, so start clean.
        sink::prepare_output(&job.output)?;

        let args = self.expand_args(job)?;
        info!(program = %self.command[0], ?args, "running external archiver");

        if let Err(e) = execute_and_stream(&self.command[0], &args, &self.root) {
            sink::discard(&job.output);
            return Err(e);
        }

        if !job.output.is_file() {
            anyhow::bail!(
                "archiver '{}' reported success but {} was not created",
                self.command[0],
                job.output.display()
            );
        }

        let files = job.all_files();
        let bytes = total_size(&files).context("measuring archived files")?;
        Ok(ArchiveStats {
            files: files.len(),
            bytes,
        })
    }
}
