use anyhow::{Context, Result};
use distpack_lib::{Backend, Config, Mode, PackError};
use std::{
    collections::{HashMap, HashSet},
    env, fs,
    str::FromStr,
};
use tracing::warn;

const ENV_PREFIX: &str = "DISTPACK_";

/// Reads environment variables prefixed with DISTPACK_
pub fn read_env() -> Config {
    read_env_from(&env::vars().collect())
}

pub fn read_env_from(vars: &HashMap<String, String>) -> Config {
    let get = |key: &str| vars.get(&format!("{ENV_PREFIX}{key}")).cloned();
    let flag = |key: &str| get(key).map(|v| parse_bool(&v));
    let list = |key: &str| get(key).map(|v| split_list(&v));

    Config {
        root: get("ROOT"),
        output: get("OUTPUT"),
        config: get("CONFIG"),
        mode: get("MODE").and_then(|v| parse_or_warn("MODE", &v)),
        folders: list("FOLDERS"),
        name: get("NAME"),
        backend: get("BACKEND").and_then(|v| parse_or_warn("BACKEND", &v)),
        command: list("COMMAND"),
        compress: flag("COMPRESS"),
        skip: list("SKIP"),
        max_size: get("MAX_SIZE"),
        before: get("BEFORE"),
        after: get("AFTER"),
        dry: flag("DRY"),
        pause: flag("PAUSE"),
        allow_missing: flag("ALLOW_MISSING"),
        fail_fast: flag("FAIL_FAST"),
    }
}

fn parse_or_warn<T: FromStr<Err = String>>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = %format!("{ENV_PREFIX}{key}"), "ignoring environment value: {e}");
            None
        }
    }
}

fn parse_bool(v: &str) -> bool {
    v == "true" || v == "1" || v.eq_ignore_ascii_case("yes")
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads YAML or JSON config from file
pub fn read_config_file(path: &str) -> Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON config {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML config {path}"))?
    };
    Ok(cfg)
}

/// Merge configs by priority: env < file < cli
pub fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        root: pick(env.root, file.root, cli.root),
        output: pick(env.output, file.output, cli.output),
        config: pick(env.config, file.config, cli.config),
        mode: pick(env.mode, file.mode, cli.mode),
        folders: pick(env.folders, file.folders, cli.folders),
        name: pick(env.name, file.name, cli.name),
        backend: pick(env.backend, file.backend, cli.backend),
        command: pick(env.command, file.command, cli.command),
        compress: pick(env.compress, file.compress, cli.compress),
        skip: pick(env.skip, file.skip, cli.skip),
        max_size: pick(env.max_size, file.max_size, cli.max_size),
        before: pick(env.before, file.before, cli.before),
        after: pick(env.after, file.after, cli.after),
        dry: pick(env.dry, file.dry, cli.dry),
        pause: pick(env.pause, file.pause, cli.pause),
        allow_missing: pick(env.allow_missing, file.allow_missing, cli.allow_missing),
        fail_fast: pick(env.fail_fast, file.fail_fast, cli.fail_fast),
    }
}

/// Fills every option that has a sensible default.
pub fn apply_defaults(cfg: &mut Config) {
    let mode = *cfg.mode.get_or_insert(Mode::default());
    cfg.backend.get_or_insert(Backend::default());
    cfg.compress.get_or_insert(true);
    if cfg.folders.is_none() {
        cfg.folders = Some(cfg.folder_names());
    }
    cfg.name.get_or_insert_with(|| match mode {
        Mode::PerFolder => "%folder%.zip".to_string(),
        Mode::Combined => "%root%.zip".to_string(),
    });
    cfg.dry.get_or_insert(false);
    cfg.pause.get_or_insert(false);
    cfg.allow_missing.get_or_insert(false);
    cfg.fail_fast.get_or_insert(false);
}

/// Rejects merged configurations that cannot produce a sensible run.
pub fn validate(cfg: &Config) -> Result<(), PackError> {
    let folders = cfg.folder_names();
    if folders.is_empty() {
        return Err(PackError::InvalidConfig(
            "at least one folder must be configured".into(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = folders.iter().find(|f| !seen.insert(f.as_str())) {
        return Err(PackError::InvalidConfig(format!(
            "folder '{dup}' is listed more than once"
        )));
    }
    if let Some(bad) = folders
        .iter()
        .find(|f| f.is_empty() || f.contains(['/', '\\']) || *f == "..")
    {
        return Err(PackError::InvalidConfig(format!(
            "folder '{bad}' must be a plain directory name under the install root"
        )));
    }

    if cfg.backend == Some(Backend::External)
        && cfg.command.as_ref().is_none_or(|c| c.is_empty())
    {
        return Err(PackError::InvalidConfig(
            "backend 'external' requires a command (e.g. --command 7z --command a --command {archive} --command {sources})".into(),
        ));
    }

    let name = cfg.name.as_deref().unwrap_or_default();
    if name.trim().is_empty() {
        return Err(PackError::InvalidConfig("archive name template is empty".into()));
    }
    if cfg.mode == Some(Mode::PerFolder)
        && folders.len() > 1
        && !name.to_ascii_lowercase().contains("%folder%")
    {
        return Err(PackError::InvalidConfig(format!(
            "name template '{name}' must contain %folder% in per-folder mode"
        )));
    }

    Ok(())
}
