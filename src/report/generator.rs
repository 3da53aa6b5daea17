//! Report generation.
//!
//! This module renders the run summaries as text and CSV, and delivers
//! them either to the log stream or to four files sharing a prefix.

use crate::analysis::{sort_by_count, Summaries};
use crate::models::{Finding, MetadataRecord, MetadataSortKey, FINDING_HEADER, METADATA_HEADER};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const RESULTS_ALL_SUFFIX: &str = "_all.csv";
pub const RESULTS_PATTERN_SUFFIX: &str = "_pattern.txt";
pub const RESULTS_SUMMARY_SUFFIX: &str = "_summary.txt";
pub const RESULTS_METADATA_SUFFIX: &str = "_metadata.csv";

/// Mode of saved report files.
#[cfg(unix)]
const REPORT_FILE_MODE: u32 = 0o644;

/// How reports are emitted when nothing is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text, as written to the report files (default)
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Where the reports go.
#[derive(Debug, Clone)]
pub enum ReportDestination {
    /// Emit to the log stream.
    Log(OutputFormat),
    /// Write the four report files.
    Files(ReportPaths),
}

/// Paths of the four report files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub all: PathBuf,
    pub pattern: PathBuf,
    pub summary: PathBuf,
    pub metadata: PathBuf,
}

impl ReportPaths {
    /// Paths for `prefix` inside `results_dir`.
    pub fn new(results_dir: &Path, prefix: &str) -> Self {
        let make_path = |suffix: &str| results_dir.join(format!("{}{}", prefix, suffix));

        Self {
            all: make_path(RESULTS_ALL_SUFFIX),
            pattern: make_path(RESULTS_PATTERN_SUFFIX),
            summary: make_path(RESULTS_SUMMARY_SUFFIX),
            metadata: make_path(RESULTS_METADATA_SUFFIX),
        }
    }
}

/// Render all reports to `destination`.
pub fn render(
    summaries: &Summaries,
    findings: &[Finding],
    sort_key: MetadataSortKey,
    destination: &ReportDestination,
) -> Result<()> {
    match destination {
        ReportDestination::Log(format) => log_reports(summaries, sort_key, *format),
        ReportDestination::Files(paths) => write_reports(paths, summaries, findings, sort_key),
    }
}

/// Generate the pattern report.
pub fn generate_pattern_summary(summaries: &Summaries) -> String {
    let mut report = String::new();

    report.push_str("===== Patterns =====\n");
    report.push_str("Total instances of each effect pattern:\n");
    for (pattern, count) in sort_by_count(&summaries.patterns) {
        report.push_str(&format!("{}: {}\n", pattern, count));
    }

    report
}

/// Generate the crate report. Crates without findings are only counted.
pub fn generate_package_summary(summaries: &Summaries) -> String {
    let mut report = String::new();
    let mut num_nonzero = 0;
    let mut num_zero = 0;

    report.push_str("===== Crate Summary =====\n");
    report.push_str("Number of effects by crate:\n");
    for (package, count) in sort_by_count(&summaries.packages) {
        if count > 0 {
            num_nonzero += 1;
            report.push_str(&format!("{}: {}\n", package, count));
        } else {
            num_zero += 1;
        }
    }

    report.push_str("===== Crate Totals =====\n");
    report.push_str(&format!("{} crates with 1 or more effects\n", num_nonzero));
    report.push_str(&format!("{} crates with 0 effects\n", num_zero));

    report
}

/// Generate the metadata CSV, highest sort key first.
pub fn generate_metadata_csv(summaries: &Summaries, sort_key: MetadataSortKey) -> String {
    let mut csv = format!("crate, {}\n", METADATA_HEADER);

    for (package, metadata) in sorted_metadata(summaries, sort_key) {
        csv.push_str(&format!("{}, {}\n", package, metadata));
    }

    csv
}

/// Generate the CSV of every finding in run order.
pub fn generate_findings_csv(findings: &[Finding]) -> String {
    let mut csv = format!("{}\n", FINDING_HEADER);

    for finding in findings {
        csv.push_str(&finding.to_csv_row());
        csv.push('\n');
    }

    csv
}

fn sorted_metadata(summaries: &Summaries, sort_key: MetadataSortKey) -> Vec<(&str, &MetadataRecord)> {
    let mut rows: Vec<(&str, &MetadataRecord)> = summaries
        .metadata
        .iter()
        .map(|(package, metadata)| (package.as_str(), metadata))
        .collect();
    rows.sort_by(|a, b| sort_key.compare(b.1, a.1));
    rows
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    patterns: Vec<JsonCount<'a>>,
    crates: Vec<JsonCount<'a>>,
    crates_with_effects: usize,
    crates_without_effects: usize,
    metadata_header: &'static str,
    metadata: Vec<JsonMetadata<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonCount<'a> {
    name: &'a str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct JsonMetadata<'a> {
    #[serde(rename = "crate")]
    package: &'a str,
    row: &'a str,
}

fn to_counts(entries: Vec<(&str, usize)>) -> Vec<JsonCount<'_>> {
    entries
        .into_iter()
        .map(|(name, count)| JsonCount { name, count })
        .collect()
}

/// Generate the JSON form of the summaries.
pub fn generate_json_report(summaries: &Summaries, sort_key: MetadataSortKey) -> Result<String> {
    let with_effects = summaries.packages_with_findings();

    let report = JsonReport {
        patterns: to_counts(sort_by_count(&summaries.patterns)),
        crates: to_counts(
            sort_by_count(&summaries.packages)
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .collect(),
        ),
        crates_with_effects: with_effects,
        crates_without_effects: summaries.packages.len() - with_effects,
        metadata_header: METADATA_HEADER,
        metadata: sorted_metadata(summaries, sort_key)
            .into_iter()
            .map(|(package, metadata)| JsonMetadata {
                package,
                row: metadata.as_str(),
            })
            .collect(),
    };

    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Emit the reports to the log stream.
pub fn log_reports(
    summaries: &Summaries,
    sort_key: MetadataSortKey,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            info!("{}", generate_pattern_summary(summaries).trim_end());
            info!("{}", generate_package_summary(summaries).trim_end());
            info!("{}", generate_metadata_csv(summaries, sort_key));
        }
        OutputFormat::Json => {
            info!("{}", generate_json_report(summaries, sort_key)?);
        }
    }

    Ok(())
}

/// Write the four report files, in order. Each file is replaced
/// atomically; the set as a whole is not.
pub fn write_reports(
    paths: &ReportPaths,
    summaries: &Summaries,
    findings: &[Finding],
    sort_key: MetadataSortKey,
) -> Result<()> {
    let pattern_report = generate_pattern_summary(summaries);
    let package_report = generate_package_summary(summaries);
    let metadata_csv = generate_metadata_csv(summaries, sort_key);

    info!("Saving all results to {}", paths.all.display());
    write_atomic(&paths.all, &generate_findings_csv(findings))?;

    info!("Saving pattern totals to {}", paths.pattern.display());
    write_atomic(&paths.pattern, &pattern_report)?;

    info!("Saving summary to {}", paths.summary.display());
    write_atomic(&paths.summary, &package_report)?;

    info!("Saving metadata to {}", paths.metadata.display());
    write_atomic(&paths.metadata, &metadata_csv)?;

    Ok(())
}

/// Write `content` to a temporary sibling of `path`, then rename it over `path`.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create results directory {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    // Temporary files are created owner-only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(REPORT_FILE_MODE))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    file.persist(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_finding(package: &str, pattern: &str, line: usize) -> Finding {
        Finding {
            package: package.to_string(),
            fn_decl: "f".to_string(),
            callee: "g".to_string(),
            pattern: pattern.to_string(),
            dir: "src".to_string(),
            file: "lib.rs".to_string(),
            line,
            col: 1,
        }
    }

    fn create_test_run() -> (Summaries, Vec<Finding>) {
        let mut summaries = Summaries::with_packages(["alpha", "beta", "gamma", "delta"]);
        let alpha = vec![create_test_finding("alpha", "FileRead", 3)];
        let beta = vec![
            create_test_finding("beta", "Unsafe", 1),
            create_test_finding("beta", "Unsafe", 2),
            create_test_finding("beta", "FileRead", 9),
        ];

        summaries.fold("alpha", &alpha, MetadataRecord::new("5, 1,1,0"));
        summaries.fold("beta", &beta, MetadataRecord::new("12, 2,2,0"));
        summaries.fold("gamma", &[], MetadataRecord::new("40, 0,0,0"));

        let findings = alpha.into_iter().chain(beta).collect();
        (summaries, findings)
    }

    #[test]
    fn test_generate_pattern_summary() {
        let (summaries, _) = create_test_run();

        assert_eq!(
            generate_pattern_summary(&summaries),
            "===== Patterns =====\n\
             Total instances of each effect pattern:\n\
             FileRead: 2\n\
             Unsafe: 2\n"
        );
    }

    #[test]
    fn test_generate_package_summary() {
        let (summaries, _) = create_test_run();

        assert_eq!(
            generate_package_summary(&summaries),
            "===== Crate Summary =====\n\
             Number of effects by crate:\n\
             beta: 3\n\
             alpha: 1\n\
             ===== Crate Totals =====\n\
             2 crates with 1 or more effects\n\
             2 crates with 0 effects\n"
        );
    }

    #[test]
    fn test_generate_metadata_csv() {
        let (summaries, _) = create_test_run();

        let csv = generate_metadata_csv(&summaries, MetadataSortKey::Column(0));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], format!("crate, {}", METADATA_HEADER));
        assert_eq!(lines[1], "gamma, 40, 0,0,0");
        assert_eq!(lines[2], "beta, 12, 2,2,0");
        assert_eq!(lines[3], "alpha, 5, 1,1,0");

        // Lexicographic order puts "5" ahead of "40" and "12"
        let raw = generate_metadata_csv(&summaries, MetadataSortKey::Raw);
        assert_eq!(raw.lines().nth(1), Some("alpha, 5, 1,1,0"));
    }

    #[test]
    fn test_generate_findings_csv() {
        let (_, findings) = create_test_run();

        let csv = generate_findings_csv(&findings);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], FINDING_HEADER);
        assert_eq!(lines[1], "alpha, f, g, FileRead, src, lib.rs, 3, 1");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let (summaries, findings) = create_test_run();
        let key = MetadataSortKey::default();

        assert_eq!(
            generate_pattern_summary(&summaries),
            generate_pattern_summary(&summaries.clone())
        );
        assert_eq!(
            generate_metadata_csv(&summaries, key),
            generate_metadata_csv(&summaries, key)
        );
        assert_eq!(
            generate_json_report(&summaries, key).unwrap(),
            generate_json_report(&summaries, key).unwrap()
        );
        assert_eq!(generate_findings_csv(&findings), generate_findings_csv(&findings));
    }

    #[test]
    fn test_generate_json_report() {
        let (summaries, _) = create_test_run();

        let json = generate_json_report(&summaries, MetadataSortKey::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["crates_with_effects"], 2);
        assert_eq!(value["crates_without_effects"], 2);
        assert_eq!(value["crates"][0]["name"], "beta");
        assert_eq!(value["metadata"][0]["crate"], "gamma");
    }

    #[test]
    fn test_report_paths() {
        let paths = ReportPaths::new(Path::new("data/results"), "top100");
        assert_eq!(paths.all, PathBuf::from("data/results/top100_all.csv"));
        assert_eq!(paths.pattern, PathBuf::from("data/results/top100_pattern.txt"));
        assert_eq!(paths.summary, PathBuf::from("data/results/top100_summary.txt"));
        assert_eq!(paths.metadata, PathBuf::from("data/results/top100_metadata.csv"));
    }

    #[test]
    fn test_write_reports() {
        let dir = TempDir::new().unwrap();
        let results_dir = dir.path().join("results");
        let paths = ReportPaths::new(&results_dir, "run");
        let (summaries, findings) = create_test_run();

        render(
            &summaries,
            &findings,
            MetadataSortKey::default(),
            &ReportDestination::Files(paths.clone()),
        )
        .unwrap();

        let pattern = std::fs::read_to_string(&paths.pattern).unwrap();
        assert_eq!(pattern, generate_pattern_summary(&summaries));

        let all = std::fs::read_to_string(&paths.all).unwrap();
        assert!(all.starts_with(FINDING_HEADER));
        assert!(paths.summary.exists());
        assert!(paths.metadata.exists());

        // Only the four reports are left behind
        assert_eq!(std::fs::read_dir(&results_dir).unwrap().count(), 4);
    }

    #[test]
    fn test_write_reports_overwrites() {
        let dir = TempDir::new().unwrap();
        let paths = ReportPaths::new(dir.path(), "run");
        let (summaries, findings) = create_test_run();

        std::fs::write(&paths.pattern, "stale").unwrap();
        write_reports(&paths, &summaries, &findings, MetadataSortKey::default()).unwrap();

        let pattern = std::fs::read_to_string(&paths.pattern).unwrap();
        assert!(pattern.starts_with("===== Patterns ====="));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_reports_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let paths = ReportPaths::new(dir.path(), "run");
        let (summaries, findings) = create_test_run();

        write_reports(&paths, &summaries, &findings, MetadataSortKey::default()).unwrap();

        for path in [&paths.all, &paths.pattern, &paths.summary, &paths.metadata] {
            let mode = std::fs::metadata(path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o644, "{}", path.display());
        }
    }
}
