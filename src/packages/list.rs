//! Crate list files.
//!
//! A list file is comma-delimited with the crate name in the first column;
//! the remaining columns (downloads, versions, ...) are informational.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Read crate names from a list file.
pub fn load_package_list(path: &Path, has_header: bool) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read crate list: {}", path.display()))?;

    let packages = parse_package_list(&content, has_header);
    if packages.is_empty() {
        anyhow::bail!("Crate list is empty: {}", path.display());
    }

    Ok(packages)
}

/// Extract crate names from list file content.
pub fn parse_package_list(content: &str, has_header: bool) -> Vec<String> {
    let skip = usize::from(has_header);

    content
        .lines()
        .skip(skip)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut columns = line.split(',').map(clean_field);
            let name = columns.next().filter(|name| !name.is_empty())?;
            let rest: Vec<&str> = columns.collect();
            debug!("Input crate: {} ({})", name, rest.join(","));
            Some(name.to_string())
        })
        .collect()
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}
