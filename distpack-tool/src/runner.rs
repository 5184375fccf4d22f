use distpack_lib::PackError;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::fs_utils::encode_size;
use crate::packaging::{ArchiveStats, Archiver};
use crate::plan::{Plan, PlanEntry};
use crate::shell_exec::execute_shell;

/// Result of a single plan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Archived(ArchiveStats),
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub label: String,
    pub output: Option<PathBuf>,
    pub outcome: Outcome,
}

/// Outcomes of a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn archived(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Archived(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 { 1 } else { 0 }
    }

    pub fn print_summary(&self) {
        println!();
        for job in &self.outcomes {
            match &job.outcome {
                Outcome::Archived(stats) => {
                    let output = job
                        .output
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    println!(
                        "  ok      {:<16} {} files, {} -> {}",
                        job.label,
                        stats.files,
                        encode_size(stats.bytes),
                        output
                    );
                }
                Outcome::Failed(reason) => println!("  FAILED  {:<16} {}", job.label, reason),
                Outcome::Skipped(reason) => println!("  skipped {:<16} {}", job.label, reason),
            }
        }
        println!(
            "{} archived, {} failed, {} skipped",
            self.archived(),
            self.failed(),
            self.skipped()
        );
    }
}

/// Hooks and failure policy for [`execute`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub before: Option<String>,
    pub after: Option<String>,
    pub fail_fast: bool,
}

/// Runs the `before` hook, every plan entry in order, then the `after` hook.
///
/// A failing archive is recorded and the run moves on to the next entry
/// unless `fail_fast` is set. Only a failing `before` hook aborts the run.
pub fn execute(
    plan: &Plan,
    archiver: &dyn Archiver,
    opts: &RunOptions,
) -> Result<RunReport, PackError> {
    if let Some(before) = &opts.before {
        info!(command = %before, "running before hook");
        execute_shell(before, &plan.root).map_err(|e| PackError::HookFailed {
            stage: "before".into(),
            message: format!("{e:#}"),
        })?;
    }

    let mut report = RunReport::default();
    let mut halted = false;

    for entry in &plan.entries {
        let (label, output) = match entry {
            PlanEntry::Archive(job) => (job.label.clone(), Some(job.output.clone())),
            PlanEntry::Missing { label, .. } => (label.clone(), None),
        };

        if halted {
            report.outcomes.push(JobOutcome {
                label,
                output,
                outcome: Outcome::Skipped("not attempted after an earlier failure".into()),
            });
            continue;
        }

        let outcome = match entry {
            PlanEntry::Missing {
                folders, fatal, ..
            } => {
                let reason = format!("folder not found: {}", folders.join(", "));
                if *fatal {
                    error!(%label, "{reason}");
                    Outcome::Failed(reason)
                } else {
                    Outcome::Skipped(reason)
                }
            }
            PlanEntry::Archive(job) => {
                info!(
                    archiver = archiver.name(),
                    %label,
                    files = job.file_count(),
                    output = %job.output.display(),
                    "archiving"
                );
                match archiver.archive(job) {
                    Ok(stats) => {
                        info!(%label, files = stats.files, bytes = stats.bytes, "archived");
                        Outcome::Archived(stats)
                    }
                    Err(e) => {
                        error!(%label, error = %format!("{e:#}"), "archiving failed");
                        Outcome::Failed(format!("{e:#}"))
                    }
                }
            }
        };

        if matches!(outcome, Outcome::Failed(_)) && opts.fail_fast {
            halted = true;
        }
        report.outcomes.push(JobOutcome {
            label,
            output,
            outcome,
        });
    }

    if let Some(after) = &opts.after {
        info!(command = %after, "running after hook");
        if let Err(e) = execute_shell(after, &plan.root) {
            warn!(error = %format!("{e:#}"), "after hook failed");
            report.outcomes.push(JobOutcome {
                label: "after hook".into(),
                output: None,
                outcome: Outcome::Failed(format!("{e:#}")),
            });
        }
    }

    Ok(report)
}

/// Prints what a run would do without writing anything.
pub fn print_plan(plan: &Plan) {
    println!("--- DRY RUN ---");
    println!("Root: {}", plan.root.display());
    println!("Mode: {}", plan.mode);
    for entry in &plan.entries {
        match entry {
            PlanEntry::Archive(job) => {
                println!(
                    "{} -> {} ({} files)",
                    job.label,
                    job.output.display(),
                    job.file_count()
                );
                for source in &job.sources {
                    for file in &source.files {
                        println!("  {}", file.display());
                    }
                }
            }
            PlanEntry::Missing {
                label,
                folders,
                fatal,
            } => {
                let verdict = if *fatal { "would fail" } else { "would skip" };
                println!("{label}: {verdict}, folder not found: {}", folders.join(", "));
            }
        }
    }
    println!("Total size: {}", encode_size(plan.total_bytes));
}
