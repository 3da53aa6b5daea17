//! Error types for a batch scan.
//!
//! Resolver, analyzer and parser failures are typed so the runner can
//! decide per error whether to skip the crate or abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Violations of the analyzer's output grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unexpected finding header: {found:?}")]
    UnexpectedFindingHeader { found: String },

    #[error("malformed finding row on line {line}: {reason}")]
    MalformedFinding { line: usize, reason: String },

    #[error("unexpected metadata header: {found:?}")]
    UnexpectedMetadataHeader { found: String },

    #[error("unexpected trailing output on line {line}: {found:?}")]
    TrailingOutput { line: usize, found: String },

    #[error("unexpected end of output: expected {expected}")]
    UnexpectedEof { expected: &'static str },
}

/// Per-crate failures surfaced to the runner.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("crate not found during test run: {}", path.display())]
    SourceMissing { package: String, path: PathBuf },

    #[error("fetch failed for crate {package}: {diagnostic}")]
    FetchFailed { package: String, diagnostic: String },

    #[error("analyzer failed for crate {package}: {diagnostic}")]
    AnalyzerFailed { package: String, diagnostic: String },

    #[error("analyzer output for crate {package} is invalid: {source}")]
    Protocol {
        package: String,
        #[source]
        source: ProtocolError,
    },
}

impl ScanError {
    /// Whether this error must stop the whole run.
    pub fn is_fatal(&self, skip_malformed: bool) -> bool {
        match self {
            ScanError::SourceMissing { .. } => false,
            ScanError::Protocol { .. } => !skip_malformed,
            ScanError::FetchFailed { .. } | ScanError::AnalyzerFailed { .. } => true,
        }
    }

    /// Crate the error refers to.
    pub fn package(&self) -> &str {
        match self {
            ScanError::SourceMissing { package, .. }
            | ScanError::FetchFailed { package, .. }
            | ScanError::AnalyzerFailed { package, .. }
            | ScanError::Protocol { package, .. } => package,
        }
    }
}

/// Crate and pattern summaries disagree on the number of findings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "crate summary and pattern summary are inconsistent: {pattern_total} findings by pattern, {package_total} by crate"
)]
pub struct ConsistencyError {
    pub pattern_total: usize,
    pub package_total: usize,
}
