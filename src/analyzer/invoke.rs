//! Running the external analyzer.
//!
//! The analyzer is a separate binary run once per crate directory. Its
//! stdout is read to completion and handed to the protocol decoder.

use crate::config::AnalyzerConfig;
use crate::error::ScanError;
use crate::models::Package;
use anyhow::Context;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Capability to produce the raw analyzer output for one crate.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Run the analyzer on `package` and return everything it wrote to stdout.
    async fn analyze(&self, package: &Package) -> Result<Vec<u8>, ScanError>;
}

/// Analyzer backed by a subprocess.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    /// Build the analyzer command from config. `std_only` appends the
    /// configured standard-library flag.
    pub fn new(config: &AnalyzerConfig, std_only: bool) -> Self {
        let mut args = config.args.clone();
        if std_only {
            args.push(config.std_flag.clone());
        }

        Self {
            program: config.command.clone(),
            args,
        }
    }

    /// Full argument list for a run on `package`.
    pub fn command_line(&self, package: &Package) -> Vec<String> {
        let mut line = vec![
            self.program.clone(),
            package.dir.to_string_lossy().to_string(),
        ];
        line.extend(self.args.iter().cloned());
        line
    }

    /// Check that the analyzer binary can be started.
    pub async fn probe(&self) -> anyhow::Result<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Missing analyzer: cannot run {}", self.program))?;

        if !status.success() {
            anyhow::bail!("Analyzer check failed: {} --version exited with {}", self.program, status);
        }

        Ok(())
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(&self, package: &Package) -> Result<Vec<u8>, ScanError> {
        debug!("Scanning crate: {}", package.id);
        debug!("Running: {:?}", self.command_line(package));

        let output = Command::new(&self.program)
            .arg(&package.dir)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ScanError::AnalyzerFailed {
                package: package.id.clone(),
                diagnostic: format!("cannot run {}: {}", self.program, e),
            })?;

        // The stream decides whether the run is usable, so a bad exit
        // status is only reported.
        if !output.status.success() {
            warn!(
                "Analyzer exited with {} for crate {}: {}",
                output.status,
                package.id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.stdout)
    }
}
