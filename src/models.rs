//! Data models for a batch scan.
//!
//! This module contains the records decoded from the analyzer's output
//! stream and the fixed column layouts the analyzer is expected to emit.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Header row that opens every analyzer stream.
pub const FINDING_HEADER: &str = "crate, fn_decl, callee, effect, dir, file, line, col";

/// Header row that introduces the per-crate metadata row.
pub const METADATA_HEADER: &str = "total, loc_lb, loc_ub, macros, loc_lb, loc_ub, conditional_code, loc_lb, loc_ub, skipped_calls, loc_lb, loc_ub, skipped_fn_ptrs, loc_lb, loc_ub, skipped_other, loc_lb, loc_ub, unsafe_trait, loc_lb, loc_ub, unsafe_impl, loc_lb, loc_ub, pub_fns, pub_fns_with_effects, pub_total_effects";

/// Separator between columns of a finding row.
pub const FIELD_SEPARATOR: &str = ", ";

/// Number of columns in a finding row.
pub const FINDING_COLUMNS: usize = 8;

/// Column holding the pattern kind (0-indexed).
pub const PATTERN_COLUMN: usize = 3;

/// A crate taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Crate identifier as given on the command line or in the list file.
    pub id: String,
    /// Local directory holding the crate source.
    pub dir: PathBuf,
}

impl Package {
    pub fn new(id: impl Into<String>, dir: PathBuf) -> Self {
        Self { id: id.into(), dir }
    }
}

/// A single effect reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Crate name as reported by the analyzer.
    pub package: String,
    /// Enclosing function.
    pub fn_decl: String,
    /// Called function or accessed item.
    pub callee: String,
    /// Pattern kind (e.g. `FileRead`, `Unsafe`).
    pub pattern: String,
    /// Directory of the source file.
    pub dir: String,
    /// Source file name.
    pub file: String,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number.
    pub col: usize,
}

impl Finding {
    /// Render the finding in the analyzer's own row format.
    pub fn to_csv_row(&self) -> String {
        [
            self.package.as_str(),
            self.fn_decl.as_str(),
            self.callee.as_str(),
            self.pattern.as_str(),
            self.dir.as_str(),
            self.file.as_str(),
            &self.line.to_string(),
            &self.col.to_string(),
        ]
        .join(FIELD_SEPARATOR)
    }
}

/// Opaque per-crate metadata row.
///
/// The core never decomposes this row except through a [`MetadataSortKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord(String);

impl MetadataRecord {
    pub fn new(row: impl Into<String>) -> Self {
        Self(row.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `index`-th comma-separated field, trimmed.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.0.split(',').nth(index).map(str::trim)
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The decoded output of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageScan {
    /// Crate the analyzer was run on.
    pub package: String,
    /// Findings in stream order.
    pub findings: Vec<Finding>,
    /// The crate's metadata row.
    pub metadata: MetadataRecord,
}

/// Ordering used for the metadata report.
///
/// Parsed from `column:<n>` or `raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetadataSortKey {
    /// Compare the n-th field numerically; non-numeric fields sort lowest.
    Column(usize),
    /// Compare the raw rows as strings.
    Raw,
}

impl Default for MetadataSortKey {
    fn default() -> Self {
        MetadataSortKey::Column(0)
    }
}

impl MetadataSortKey {
    /// Ascending comparison of two metadata rows under this key.
    pub fn compare(&self, a: &MetadataRecord, b: &MetadataRecord) -> Ordering {
        match self {
            MetadataSortKey::Column(index) => {
                let key = |m: &MetadataRecord| m.field(*index).and_then(|f| f.parse::<i64>().ok());
                key(a).cmp(&key(b))
            }
            MetadataSortKey::Raw => a.as_str().cmp(b.as_str()),
        }
    }
}

impl fmt::Display for MetadataSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSortKey::Column(index) => write!(f, "column:{}", index),
            MetadataSortKey::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for MetadataSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("raw") {
            return Ok(MetadataSortKey::Raw);
        }

        match s.strip_prefix("column:") {
            Some(index) => index
                .trim()
                .parse::<usize>()
                .map(MetadataSortKey::Column)
                .map_err(|_| format!("Invalid column index in sort key: {}", s)),
            None => Err(format!(
                "Unknown metadata sort key '{}' (expected 'raw' or 'column:<n>')",
                s
            )),
        }
    }
}

impl TryFrom<String> for MetadataSortKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetadataSortKey> for String {
    fn from(key: MetadataSortKey) -> Self {
        key.to_string()
    }
}
