//! Making sure a crate's source is on disk before it is scanned.
//!
//! Sources live under a base directory, one subdirectory per crate. A
//! missing crate is downloaded through a [`SourceFetcher`], except in test
//! runs where only pre-placed fixtures are used.

use crate::config::FetchConfig;
use crate::error::ScanError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Capability to download a crate's source into a directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `package` into `target`. The error is a human-readable
    /// diagnostic.
    async fn fetch(&self, package: &str, target: &Path) -> Result<(), String>;
}

/// Fetcher that shells out to a download tool (`cargo download` by default).
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    command: Vec<String>,
    output_flag: String,
}

impl CommandFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            command: config.command.clone(),
            output_flag: config.output_flag.clone(),
        }
    }
}

#[async_trait]
impl SourceFetcher for CommandFetcher {
    async fn fetch(&self, package: &str, target: &Path) -> Result<(), String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| "fetch command is empty".to_string())?;

        let output = Command::new(program)
            .args(args)
            .arg(package)
            .arg(&self.output_flag)
            .arg(target)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("cannot run {}: {}", program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Ensure `base_dir/package` exists, downloading it unless `test_mode` is set.
pub async fn ensure_source<F>(
    fetcher: &F,
    package: &str,
    base_dir: &Path,
    test_mode: bool,
) -> Result<PathBuf, ScanError>
where
    F: SourceFetcher + ?Sized,
{
    let target = base_dir.join(package);

    if target.exists() {
        debug!("Found existing crate: {}", target.display());
        return Ok(target);
    }

    if test_mode {
        return Err(ScanError::SourceMissing {
            package: package.to_string(),
            path: target,
        });
    }

    info!("Downloading crate: {}", target.display());
    fetcher
        .fetch(package, &target)
        .await
        .map_err(|diagnostic| ScanError::FetchFailed {
            package: package.to_string(),
            diagnostic,
        })?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requests and creates the target directory.
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceFetcher for RecordingFetcher {
        async fn fetch(&self, package: &str, target: &Path) -> Result<(), String> {
            self.calls.lock().unwrap().push(package.to_string());
            std::fs::create_dir_all(target).map_err(|e| e.to_string())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, _package: &str, _target: &Path) -> Result<(), String> {
            Err("exit status: 101".to_string())
        }
    }

    #[test]
    fn test_existing_source_is_reused() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("serde")).unwrap();
        let fetcher = RecordingFetcher::default();

        let path =
            tokio_test::block_on(ensure_source(&fetcher, "serde", base.path(), false)).unwrap();

        assert_eq!(path, base.path().join("serde"));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_source_is_fetched() {
        let base = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::default();

        let path =
            tokio_test::block_on(ensure_source(&fetcher, "rand", base.path(), false)).unwrap();

        assert!(path.is_dir());
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["rand".to_string()]);
    }

    #[test]
    fn test_test_mode_never_fetches() {
        let base = TempDir::new().unwrap();
        let fetcher = RecordingFetcher::default();

        let err =
            tokio_test::block_on(ensure_source(&fetcher, "rand", base.path(), true)).unwrap_err();

        assert!(matches!(err, ScanError::SourceMissing { .. }));
        assert!(!err.is_fatal(false));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_failure_is_fatal() {
        let base = TempDir::new().unwrap();

        let err = tokio_test::block_on(ensure_source(&FailingFetcher, "rand", base.path(), false))
            .unwrap_err();

        match &err {
            ScanError::FetchFailed {
                package,
                diagnostic,
            } => {
                assert_eq!(package, "rand");
                assert!(diagnostic.contains("101"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_fatal(true));
    }

    #[test]
    fn test_command_fetcher_reports_exit_status() {
        let base = TempDir::new().unwrap();
        let fetcher = CommandFetcher::new(&FetchConfig {
            command: vec!["false".to_string()],
            output_flag: "-o".to_string(),
        });

        let err = tokio_test::block_on(fetcher.fetch("rand", &base.path().join("rand")))
            .unwrap_err();
        assert!(err.contains("false exited with"));
    }

    #[test]
    fn test_command_fetcher_empty_command() {
        let fetcher = CommandFetcher::new(&FetchConfig {
            command: Vec::new(),
            output_flag: "-o".to_string(),
        });

        let err = tokio_test::block_on(fetcher.fetch("rand", Path::new("unused"))).unwrap_err();
        assert_eq!(err, "fetch command is empty");
    }
}
