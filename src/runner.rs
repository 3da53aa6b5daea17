//! Batch driver.
//!
//! Resolves, analyzes and decodes each crate into its own summaries, then
//! merges those into the run summaries. Up to `concurrency` crates are in
//! flight at once, but results are merged one at a time in list order, so
//! the summaries do not depend on completion order.

use crate::analysis::Summaries;
use crate::analyzer::{parse, Analyzer};
use crate::error::ScanError;
use crate::models::{Finding, Package};
use crate::packages::{ensure_source, SourceFetcher};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory holding one subdirectory per crate.
    pub source_dir: PathBuf,
    /// Never download; crates must already be in `source_dir`.
    pub test_mode: bool,
    /// Number of crates processed at once.
    pub concurrency: usize,
    /// Skip crates with malformed analyzer output instead of aborting.
    pub skip_malformed: bool,
    /// Number of progress messages over the run (0 disables them).
    pub progress_increments: usize,
    /// Show a progress bar.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/packages"),
            test_mode: false,
            concurrency: 1,
            skip_malformed: false,
            progress_increments: 10,
            show_progress: false,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Folded summaries.
    pub summaries: Summaries,
    /// All findings in list order.
    pub findings: Vec<Finding>,
    /// Crates skipped because of a non-fatal error.
    pub skipped: Vec<String>,
}

/// Scan `packages` and fold their results. Returns the first fatal error.
pub async fn run_packages<F, A>(
    packages: &[String],
    fetcher: &F,
    analyzer: &A,
    options: &RunOptions,
) -> Result<RunOutcome, ScanError>
where
    F: SourceFetcher + ?Sized,
    A: Analyzer + ?Sized,
{
    let mut outcome = RunOutcome {
        summaries: Summaries::with_packages(packages.iter().map(String::as_str)),
        ..RunOutcome::default()
    };

    let total = packages.len();
    let progress_inc = match options.progress_increments {
        0 => 0,
        n => total / n,
    };
    let progress_bar = make_progress_bar(total as u64, options.show_progress);

    let mut results = stream::iter(
        packages
            .iter()
            .map(|package| scan_package(package, fetcher, analyzer, options)),
    )
    .buffered(options.concurrency.max(1));

    let mut done = 0;
    while let Some(result) = results.next().await {
        match result {
            Ok((partial, findings)) => {
                outcome.summaries.merge(partial);
                outcome.findings.extend(findings);
            }
            Err(e) if !e.is_fatal(options.skip_malformed) => {
                match e {
                    ScanError::SourceMissing { .. } => warn!("{}", e),
                    _ => error!("{}; skipping crate", e),
                }
                // Unscanned crates must not be reported as clean
                outcome.summaries.unregister(e.package());
                outcome.skipped.push(e.package().to_string());
            }
            Err(e) => {
                progress_bar.abandon();
                return Err(e);
            }
        }

        done += 1;
        progress_bar.inc(1);
        if progress_inc > 0 && done < total && done % progress_inc == 0 {
            info!("{}% complete", 100 * done / total);
        }
    }

    progress_bar.finish_and_clear();
    Ok(outcome)
}

/// Resolve, analyze and decode one crate into its own summaries.
async fn scan_package<F, A>(
    package: &str,
    fetcher: &F,
    analyzer: &A,
    options: &RunOptions,
) -> Result<(Summaries, Vec<Finding>), ScanError>
where
    F: SourceFetcher + ?Sized,
    A: Analyzer + ?Sized,
{
    let dir = ensure_source(fetcher, package, &options.source_dir, options.test_mode).await?;
    let package = Package::new(package, dir);

    let output = analyzer.analyze(&package).await?;

    let scan = parse(&package.id, &output).map_err(|source| ScanError::Protocol {
        package: package.id.clone(),
        source,
    })?;

    for finding in &scan.findings {
        debug!("effect found: {}", finding.to_csv_row());
    }

    let mut partial = Summaries::new();
    partial.fold_scan(&scan);
    Ok((partial, scan.findings))
}

fn make_progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible || len < 2 {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} crates ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
