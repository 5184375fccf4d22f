use anyhow::Context;
use clap::Parser;
use distpack_lib::{Backend, Config, Mode, PackError};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod fs_utils;
mod layout;
mod naming;
mod packaging;
mod plan;
mod runner;
mod shell_exec;
mod sink;
#[cfg(test)]
mod testutil;

use packaging::Archiver;
use packaging::external::ExternalArchiver;
use packaging::zip::{Compressor, ZipArchiver};

#[derive(Parser, Debug)]
#[command(
    name = "distpack",
    author,
    version,
    about = "Packages the folders of an installation into zip archives",
    long_about = None
)]
pub struct Cli {
    /// Installation root (defaults to the executable's directory, then the current directory)
    #[arg()]
    pub root: Option<String>,

    /// Archive layout [combined|per-folder]
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Directory the archives are written to (relative to the root)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Folder to package (can be specified multiple times)
    #[arg(short = 'F', long = "folder")]
    pub folders: Vec<String>,

    /// Archive file name template, e.g. "%folder%_%date%.zip"
    #[arg(short, long)]
    pub name: Option<String>,

    /// Archiver [zip|external]
    #[arg(short, long)]
    pub backend: Option<Backend>,

    /// External archiver program and arguments, one per flag; supports {archive}, {sources}, {root}
    #[arg(long = "command", allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Deflate entries (default)
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "store")]
    pub compress: bool,

    /// Store entries without compression
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub store: bool,

    /// Patterns to skip (can be specified multiple times)
    #[arg(short = 's', long)]
    pub skip: Vec<String>,

    /// Abort when the selected files exceed this size (e.g. 2Gi, 500MB; 0 = unlimited)
    #[arg(long)]
    pub max_size: Option<String>,

    /// Command to execute before packaging
    #[arg(long)]
    pub before: Option<String>,

    /// Command to execute after packaging
    #[arg(long)]
    pub after: Option<String>,

    /// Dry run (just list archives and files)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Wait for Enter before exiting
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub pause: bool,

    /// Skip folders that do not exist instead of failing
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub allow_missing: bool,

    /// Stop at the first failing folder
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub fail_fast: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (code, pause) = run_cli(&cli);

    if pause {
        wait_for_ack();
    }
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Returns the exit code and whether to pause before exiting.
///
/// The merged config is built first so that `pause` from any layer is
/// honored on every error path.
fn run_cli(cli: &Cli) -> (i32, bool) {
    let merged = match load_config(cli) {
        Ok(merged) => merged,
        Err(e) => {
            // The file layer is unreadable; env and CLI still decide.
            let pause = cli.pause || config::read_env().pause.unwrap_or(false);
            return (report_error(&e), pause);
        }
    };

    let pause = merged.pause.unwrap_or(false) && !cli.generate_yaml_config;
    match run(cli, &merged) {
        Ok(code) => (code, pause),
        Err(e) => (report_error(&e), pause),
    }
}

/// Logs `e` and maps it to an exit code.
fn report_error(e: &anyhow::Error) -> i32 {
    let code = e
        .downcast_ref::<PackError>()
        .map(PackError::exit_code)
        .unwrap_or(1);
    error!("{e:#}");
    eprintln!("Error: {e:#}");
    code
}

/// Merges env < file < CLI and applies defaults.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    // Step 1: Read environment
    let env_config = config::read_env();

    // Step 2: Read config file (if exists)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = config::read_config_file(&path)?;
        info!(path = %path, "loaded configuration");
    }

    // Step 3: Merge configs: env < file < CLI
    let mut merged = config::merge_configs(env_config, file_config, cli_to_config(cli));
    config::apply_defaults(&mut merged);
    Ok(merged)
}

fn run(cli: &Cli, merged: &Config) -> anyhow::Result<i32> {
    config::validate(merged)?;

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(merged)?;
        println!("{yaml}");
        return Ok(0);
    }

    let root = layout::resolve_root(merged.root.as_deref(), &merged.folder_names())?;
    info!(root = %root.display(), mode = %merged.mode.unwrap_or_default(), "packaging installation");

    let plan = plan::build_plan(merged, &root, chrono::Utc::now())?;
    debug!(
        archives = plan.jobs().count(),
        total = %fs_utils::encode_size(plan.total_bytes),
        "plan ready"
    );
    fs_utils::check_size_limit(plan.total_bytes, merged.max_size.as_deref())?;

    if merged.dry.unwrap_or(false) {
        runner::print_plan(&plan);
        return Ok(0);
    }

    let archiver = build_archiver(merged, &root)?;
    let opts = runner::RunOptions {
        before: merged.before.clone(),
        after: merged.after.clone(),
        fail_fast: merged.fail_fast.unwrap_or(false),
    };

    let report = runner::execute(&plan, archiver.as_ref(), &opts)?;
    report.print_summary();
    if report.failed() > 0 {
        warn!(failed = report.failed(), "some folders were not archived");
    }
    Ok(report.exit_code())
}

fn build_archiver(cfg: &Config, root: &std::path::Path) -> anyhow::Result<Box<dyn Archiver>> {
    match cfg.backend.unwrap_or_default() {
        Backend::Zip => {
            let compressor = Compressor::from_flag(cfg.compress.unwrap_or(true));
            debug!(?compressor, "using built-in zip archiver");
            Ok(Box::new(ZipArchiver::new(compressor)?))
        }
        Backend::External => {
            if cfg.skip.as_ref().is_some_and(|s| !s.is_empty()) {
                warn!("skip patterns are not passed to the external archiver");
            }
            let command = cfg.command.clone().unwrap_or_default();
            let archiver = ExternalArchiver::new(command, root.to_path_buf())
                .context("configuring external archiver")?;
            Ok(Box::new(archiver))
        }
    }
}

/// Converts CLI struct into Config. Flags that were not given stay `None`
/// so they do not mask file or env settings.
fn cli_to_config(cli: &Cli) -> Config {
    fn non_empty(v: &[String]) -> Option<Vec<String>> {
        if v.is_empty() { None } else { Some(v.to_vec()) }
    }

    let compress = if cli.store {
        Some(false)
    } else {
        cli.compress.then_some(true)
    };

    Config {
        root: cli.root.clone(),
        output: cli.output.clone(),
        config: cli.config.clone(),
        mode: cli.mode,
        folders: non_empty(&cli.folders),
        name: cli.name.clone(),
        backend: cli.backend,
        command: non_empty(&cli.command),
        compress,
        skip: non_empty(&cli.skip),
        max_size: cli.max_size.clone(),
        before: cli.before.clone(),
        after: cli.after.clone(),
        dry: cli.dry.then_some(true),
        pause: cli.pause.then_some(true),
        allow_missing: cli.allow_missing.then_some(true),
        fail_fast: cli.fail_fast.then_some(true),
    }
}

/// Blocks until the user presses Enter.
fn wait_for_ack() {
    print!("Press Enter to continue . . . ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
