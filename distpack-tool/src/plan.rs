use anyhow::Result;
use chrono::{DateTime, Utc};
use distpack_lib::{Config, Mode};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fs_utils::{compile_patterns, list_files, total_size};
use crate::layout::discover;
use crate::naming::{NameContext, output_dir, render_name, root_name};
use crate::packaging::{ArchiveJob, SourceFolder};

/// One step of a run, in execution order.
#[derive(Debug, Clone)]
pub enum PlanEntry {
    Archive(ArchiveJob),
    /// Configured folders that are not under the root. `fatal` entries fail
    /// the run; the others are reported as skipped.
    Missing {
        label: String,
        folders: Vec<String>,
        fatal: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub root: PathBuf,
    pub mode: Mode,
    pub entries: Vec<PlanEntry>,
    /// Size of every file selected for archiving.
    pub total_bytes: u64,
}

impl Plan {
    pub fn jobs(&self) -> impl Iterator<Item = &ArchiveJob> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Archive(job) => Some(job),
            PlanEntry::Missing { .. } => None,
        })
    }
}

/// Builds the ordered list of archives for `cfg` (with defaults applied).
pub fn build_plan(cfg: &Config, root: &Path, now: DateTime<Utc>) -> Result<Plan> {
    let mode = cfg.mode.unwrap_or_default();
    let allow_missing = cfg.allow_missing.unwrap_or(false);
    let skip = compile_patterns(cfg.skip.as_deref().unwrap_or_default())?;
    let template = cfg.name.as_deref().unwrap_or("%folder%.zip");
    let out_dir = output_dir(root, cfg.output.as_deref());
    let root_label = root_name(root);

    let output_for = |folder: Option<&str>| -> PathBuf {
        let ctx = NameContext {
            folder,
            root_name: &root_label,
            now,
        };
        out_dir.join(render_name(template, &ctx))
    };

    let mut entries = Vec::new();
    let mut present = Vec::new();
    let mut missing = Vec::new();

    for status in discover(root, &cfg.folder_names()) {
        if status.present {
            let files = list_files(root, &status.path, &skip)?;
            debug!(folder = %status.name, files = files.len(), "folder selected");
            present.push(SourceFolder {
                name: status.name,
                path: status.path,
                files,
            });
        } else {
            warn!(folder = %status.name, root = %root.display(), "folder not found");
            missing.push(status.name);
        }
    }

    let mut total_bytes = 0;
    for source in &present {
        total_bytes += total_size(&source.files)?;
    }

    match mode {
        Mode::PerFolder => {
            // Keep configured order, interleaving missing folders where they were listed.
            let mut present = present.into_iter().peekable();
            for name in cfg.folder_names() {
                if missing.contains(&name) {
                    entries.push(PlanEntry::Missing {
                        label: name.clone(),
                        folders: vec![name],
                        fatal: !allow_missing,
                    });
                } else if let Some(source) = present.next_if(|s| s.name == name) {
                    entries.push(PlanEntry::Archive(ArchiveJob {
                        label: source.name.clone(),
                        output: output_for(Some(source.name.as_str())),
                        sources: vec![source],
                    }));
                }
            }
        }
        Mode::Combined => {
            let output = output_for(None);
            let label = output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root_label.clone());

            if !missing.is_empty() && !allow_missing {
                // An incomplete combined archive would look like a good one.
                entries.push(PlanEntry::Missing {
                    label,
                    folders: missing,
                    fatal: true,
                });
            } else {
                for name in missing {
                    entries.push(PlanEntry::Missing {
                        label: name.clone(),
                        folders: vec![name],
                        fatal: false,
                    });
                }
                if present.is_empty() {
                    warn!("no configured folder exists, nothing to archive");
                } else {
                    entries.push(PlanEntry::Archive(ArchiveJob {
                        label,
                        output,
                        sources: present,
                    }));
                }
            }
        }
    }

    Ok(Plan {
        root: root.to_path_buf(),
        mode,
        entries,
        total_bytes,
    })
}
