//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the verbosity-to-log-level mapping.

use crate::models::MetadataSortKey;
use crate::report::OutputFormat;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Highest accepted `-v` count.
pub const MAX_VERBOSITY: u8 = 4;

/// scan-batch - run the scan effect analyzer over one crate or many
///
/// Downloads each crate if needed, runs the analyzer on it, and summarizes
/// the reported effects by pattern and by crate.
///
/// Examples:
///   scan-batch -c serde
///   scan-batch -i data/crate-lists/top100.csv -o top100
///   scan-batch -t -i data/crate-lists/test.csv -vvvv
///   scan-batch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Crate name to scan
    #[arg(
        short = 'c',
        long = "crate",
        value_name = "NAME",
        conflicts_with = "infile",
        required_unless_present_any = ["infile", "init_config"]
    )]
    pub krate: Option<String>,

    /// Scan a list of crates from a CSV file instead of a single crate
    ///
    /// The crate name is the first column. The first row is a header
    /// unless --no-header is given.
    #[arg(short, long, value_name = "FILE")]
    pub infile: Option<PathBuf>,

    /// Test run: use existing crates in the test packages directory
    /// instead of downloading them
    #[arg(short, long)]
    pub test_run: bool,

    /// Output file prefix to save results
    ///
    /// Writes <PREFIX>_all.csv, <PREFIX>_pattern.txt, <PREFIX>_summary.txt
    /// and <PREFIX>_metadata.csv to the results directory.
    #[arg(short, long, value_name = "PREFIX")]
    pub output_prefix: Option<String>,

    /// Flag standard library imports only (passed to the analyzer)
    #[arg(short, long)]
    pub std: bool,

    /// Verbosity level: -v=error, -vv=warning, -vvv=info, -vvvv=debug (default: info)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .scan-batch.toml in the current directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of crates scanned at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Skip crates with malformed analyzer output instead of aborting
    #[arg(long)]
    pub skip_malformed: bool,

    /// The crate list has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Ordering of the metadata report: column:<n> (numeric) or raw
    #[arg(long, value_name = "KEY")]
    pub metadata_sort: Option<MetadataSortKey>,

    /// Format used when reports are logged instead of saved (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Generate a default .scan-batch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose > MAX_VERBOSITY {
            return Err(format!(
                "verbosity only goes up to {} (-vvvv)",
                MAX_VERBOSITY
            ));
        }

        // Skip the rest for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref krate) = self.krate {
            if krate.trim().is_empty() {
                return Err("Crate name must not be empty".to_string());
            }
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        if let Some(ref prefix) = self.output_prefix {
            if prefix.is_empty() {
                return Err("Output prefix must not be empty".to_string());
            }
        }

        if self.quiet && self.verbose > 0 {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref infile) = self.infile {
            if !infile.is_file() {
                return Err(format!("Crate list does not exist: {}", infile.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level for the verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }

        match self.verbose {
            1 => tracing::Level::ERROR,
            2 => tracing::Level::WARN,
            0 | 3 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn make_args() -> Args {
        Args {
            krate: Some("serde".to_string()),
            infile: None,
            test_run: false,
            output_prefix: None,
            std: false,
            verbose: 0,
            quiet: false,
            config: None,
            concurrency: None,
            skip_malformed: false,
            no_header: false,
            metadata_sort: None,
            format: OutputFormat::Text,
            init_config: false,
        }
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_single_crate() {
        let args = Args::try_parse_from(["scan-batch", "-c", "serde", "-t", "-vvvv"]).unwrap();
        assert_eq!(args.krate.as_deref(), Some("serde"));
        assert!(args.test_run);
        assert_eq!(args.verbose, 4);
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_crate_and_infile_are_exclusive() {
        assert!(Args::try_parse_from(["scan-batch", "-c", "serde", "-i", "list.csv"]).is_err());
        assert!(Args::try_parse_from(["scan-batch"]).is_err());
        assert!(Args::try_parse_from(["scan-batch", "--init-config"]).is_ok());
    }

    #[test]
    fn test_metadata_sort_flag() {
        let args =
            Args::try_parse_from(["scan-batch", "-c", "serde", "--metadata-sort", "raw"]).unwrap();
        assert_eq!(args.metadata_sort, Some(MetadataSortKey::Raw));
        assert!(
            Args::try_parse_from(["scan-batch", "-c", "serde", "--metadata-sort", "x"]).is_err()
        );
    }

    #[test]
    fn test_validation_verbosity() {
        let mut args = make_args();
        args.verbose = 4;
        assert!(args.validate().is_ok());

        args.verbose = 5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = 2;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_infile() {
        let mut args = make_args();
        args.krate = None;
        args.infile = Some(PathBuf::from("no/such/list.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = 1;
        assert_eq!(args.log_level(), tracing::Level::ERROR);

        args.verbose = 2;
        assert_eq!(args.log_level(), tracing::Level::WARN);

        args.verbose = 3;
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = 4;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = 0;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
