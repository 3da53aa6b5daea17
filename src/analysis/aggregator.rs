//! Cross-crate aggregation of scan results.
//!
//! This module folds per-crate findings into the three running summaries
//! used by the reports: findings per pattern, findings per crate, and the
//! metadata row of each crate.

use crate::error::ConsistencyError;
use crate::models::{Finding, MetadataRecord, PackageScan};
use indexmap::IndexMap;

/// Running summaries for a batch run.
///
/// Maps keep insertion order so that reports break count ties by first
/// appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summaries {
    /// Pattern kind -> number of findings.
    pub patterns: IndexMap<String, usize>,
    /// Crate -> number of findings.
    pub packages: IndexMap<String, usize>,
    /// Crate -> metadata row.
    pub metadata: IndexMap<String, MetadataRecord>,
}

impl Summaries {
    /// Create empty summaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create summaries with every crate of the run registered at zero.
    pub fn with_packages<'a>(packages: impl IntoIterator<Item = &'a str>) -> Self {
        let mut summaries = Self::new();
        for package in packages {
            summaries.register(package);
        }
        summaries
    }

    /// Register a crate so it is counted even if it reports nothing.
    pub fn register(&mut self, package: &str) {
        self.packages.entry(package.to_string()).or_insert(0);
    }

    /// Drop a registered crate that was never scanned.
    ///
    /// Crates already folded are kept, so the totals are unaffected.
    pub fn unregister(&mut self, package: &str) {
        if !self.metadata.contains_key(package) && self.packages.get(package) == Some(&0) {
            self.packages.shift_remove(package);
        }
    }

    /// Fold one crate's findings and metadata into the summaries.
    pub fn fold(&mut self, package: &str, findings: &[Finding], metadata: MetadataRecord) {
        let package_count = self.packages.entry(package.to_string()).or_insert(0);
        *package_count += findings.len();

        for finding in findings {
            *self.patterns.entry(finding.pattern.clone()).or_insert(0) += 1;
        }

        self.metadata.insert(package.to_string(), metadata);
    }

    /// Fold a decoded scan, attributing it to the crate it was run on.
    pub fn fold_scan(&mut self, scan: &PackageScan) {
        self.fold(&scan.package, &scan.findings, scan.metadata.clone());
    }

    /// Merge another set of summaries into this one.
    ///
    /// Counts are added in `other`'s order; metadata rows from `other`
    /// replace existing ones.
    pub fn merge(&mut self, other: Summaries) {
        for (pattern, count) in other.patterns {
            *self.patterns.entry(pattern).or_insert(0) += count;
        }
        for (package, count) in other.packages {
            *self.packages.entry(package).or_insert(0) += count;
        }
        for (package, metadata) in other.metadata {
            self.metadata.insert(package, metadata);
        }
    }

    /// Total findings counted by pattern.
    pub fn pattern_total(&self) -> usize {
        self.patterns.values().sum()
    }

    /// Total findings counted by crate.
    pub fn package_total(&self) -> usize {
        self.packages.values().sum()
    }

    /// Number of crates with at least one finding.
    pub fn packages_with_findings(&self) -> usize {
        self.packages.values().filter(|count| **count > 0).count()
    }

    /// Verify that both summaries count the same findings.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let pattern_total = self.pattern_total();
        let package_total = self.package_total();

        if pattern_total == package_total {
            Ok(())
        } else {
            Err(ConsistencyError {
                pattern_total,
                package_total,
            })
        }
    }
}

/// Sort summary entries by count, highest first. Ties keep map order.
pub fn sort_by_count(map: &IndexMap<String, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    entries
}
