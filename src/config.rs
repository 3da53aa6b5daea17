//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.scan-batch.toml` files.

use crate::models::MetadataSortKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".scan-batch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Analyzer invocation.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Crate download.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Run policy.
    #[serde(default)]
    pub run: RunConfig,
}

/// Where crates and results live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Downloaded crate sources.
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    /// Pre-placed crates used by test runs.
    #[serde(default = "default_test_packages_dir")]
    pub test_packages_dir: PathBuf,

    /// Directory receiving report files.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            packages_dir: default_packages_dir(),
            test_packages_dir: default_test_packages_dir(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from("data/packages")
}

fn default_test_packages_dir() -> PathBuf {
    PathBuf::from("data/test-packages")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("data/results")
}

/// External analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyzer binary.
    #[serde(default = "default_analyzer_command")]
    pub command: String,

    /// Arguments placed after the crate directory.
    #[serde(default = "default_analyzer_args")]
    pub args: Vec<String>,

    /// Flag appended for standard-library-only runs.
    #[serde(default = "default_std_flag")]
    pub std_flag: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_analyzer_command(),
            args: default_analyzer_args(),
            std_flag: default_std_flag(),
        }
    }
}

fn default_analyzer_command() -> String {
    "./target/release/scan".to_string()
}

fn default_analyzer_args() -> Vec<String> {
    vec!["-e".to_string()]
}

fn default_std_flag() -> String {
    "--std".to_string()
}

/// Crate download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Download command; the crate name is appended.
    #[serde(default = "default_fetch_command")]
    pub command: Vec<String>,

    /// Flag introducing the output directory.
    #[serde(default = "default_output_flag")]
    pub output_flag: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            command: default_fetch_command(),
            output_flag: default_output_flag(),
        }
    }
}

fn default_fetch_command() -> Vec<String> {
    vec!["cargo", "download", "-x"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_output_flag() -> String {
    "-o".to_string()
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Ordering of the metadata report (`column:<n>` or `raw`).
    #[serde(default)]
    pub metadata_sort: MetadataSortKey,

    /// Number of progress messages logged over a batch.
    #[serde(default = "default_progress_increments")]
    pub progress_increments: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            metadata_sort: MetadataSortKey::default(),
            progress_increments: default_progress_increments(),
        }
    }
}

fn default_progress_increments() -> usize {
    10
}

/// Run policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of crates scanned at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Skip crates whose analyzer output is malformed instead of aborting.
    #[serde(default)]
    pub skip_malformed: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            skip_malformed: false,
        }
    }
}

fn default_concurrency() -> usize {
    1
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.run.concurrency = concurrency;
        }

        if args.skip_malformed {
            self.run.skip_malformed = true;
        }

        if let Some(sort_key) = args.metadata_sort {
            self.report.metadata_sort = sort_key;
        }
    }

    /// Directory holding crate sources for this run.
    pub fn source_dir(&self, test_run: bool) -> &Path {
        if test_run {
            &self.paths.test_packages_dir
        } else {
            &self.paths.packages_dir
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
