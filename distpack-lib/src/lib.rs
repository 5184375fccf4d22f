use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod error;

pub use error::PackError;

/// Installation subfolders packaged when nothing else is configured, in archive order.
pub const DEFAULT_FOLDERS: [&str; 9] = [
    "bin",
    "data",
    "doc",
    "Ext",
    "include",
    "lib",
    "Mod",
    "resources",
    "translations",
];

/// Every field is optional so that env, file and CLI layers can be merged.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub root: Option<String>,
    pub output: Option<String>,
    pub config: Option<String>,
    pub mode: Option<Mode>,
    pub folders: Option<Vec<String>>,
    pub name: Option<String>,
    pub backend: Option<Backend>,
    pub command: Option<Vec<String>>,
    pub compress: Option<bool>,
    pub skip: Option<Vec<String>>,
    pub max_size: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub dry: Option<bool>,
    pub pause: Option<bool>,
    pub allow_missing: Option<bool>,
    pub fail_fast: Option<bool>,
}

impl Config {
    /// Configured folders, or [`DEFAULT_FOLDERS`] when none were given.
    pub fn folder_names(&self) -> Vec<String> {
        match &self.folders {
            Some(folders) => folders.clone(),
            None => DEFAULT_FOLDERS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// How folders are grouped into archives.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// A single archive holding every folder.
    #[serde(alias = "single")]
    Combined,
    /// One archive per folder.
    #[default]
    #[serde(alias = "per_folder", alias = "split")]
    PerFolder,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" | "single" => Ok(Mode::Combined),
            "per-folder" | "per_folder" | "split" => Ok(Mode::PerFolder),
            other => Err(format!(
                "unknown mode '{other}' (expected combined or per-folder)"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Combined => write!(f, "combined"),
            Mode::PerFolder => write!(f, "per-folder"),
        }
    }
}

/// Which archiver produces the archives.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Built-in zip writer.
    #[default]
    Zip,
    /// Third-party archiver run as a subprocess.
    #[serde(alias = "exec")]
    External,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(Backend::Zip),
            "external" | "exec" => Ok(Backend::External),
            other => Err(format!(
                "unknown backend '{other}' (expected zip or external)"
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Zip => write!(f, "zip"),
            Backend::External => write!(f, "external"),
        }
    }
}
