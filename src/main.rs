//! scan-batch - batch driver for the scan effect analyzer
//!
//! Runs the analyzer over one crate or a list of crates, downloading
//! sources as needed, and summarizes the reported effects by pattern,
//! by crate, and by crate metadata.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments or a fatal error during the run

mod analysis;
mod analyzer;
mod cli;
mod config;
mod error;
mod models;
mod packages;
mod report;
mod runner;

use anyhow::{Context, Result};
use analyzer::CommandAnalyzer;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use packages::CommandFetcher;
use report::{ReportDestination, ReportPaths};
use runner::RunOptions;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    debug!("scan-batch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete batch workflow.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let analyzer = CommandAnalyzer::new(&config.analyzer, args.std);
    analyzer.probe().await?;

    let (packages, description) = resolve_packages(&args)?;

    if packages.len() > 1 && args.output_prefix.is_none() {
        warn!("No results prefix specified; results of this run will not be saved");
    }

    if args.test_run {
        info!("=== Test run ===");
    }

    let source_dir = config.source_dir(args.test_run).to_path_buf();
    info!(
        "=== Scanning {} in {} ===",
        description,
        source_dir.display()
    );

    let options = RunOptions {
        source_dir,
        test_mode: args.test_run,
        concurrency: config.run.concurrency,
        skip_malformed: config.run.skip_malformed,
        progress_increments: config.report.progress_increments,
        show_progress: !args.quiet && packages.len() > 1,
    };

    let fetcher = CommandFetcher::new(&config.fetch);
    let outcome = runner::run_packages(&packages, &fetcher, &analyzer, &options).await?;

    if !outcome.skipped.is_empty() {
        warn!(
            "Skipped {} of {} crates: {}",
            outcome.skipped.len(),
            packages.len(),
            outcome.skipped.join(", ")
        );
    }

    // Reports are still produced; the mismatch is only logged
    if let Err(e) = outcome.summaries.check_consistency() {
        error!("{}", e);
    }

    info!("=== Results ===");

    let destination = match args.output_prefix {
        Some(ref prefix) => {
            info!("=== Saving results ===");
            ReportDestination::Files(ReportPaths::new(&config.paths.results_dir, prefix))
        }
        None => ReportDestination::Log(args.format),
    };

    report::render(
        &outcome.summaries,
        &outcome.findings,
        config.report.metadata_sort,
        &destination,
    )
}

/// Collect the crates to scan and a short description for the run header.
fn resolve_packages(args: &Args) -> Result<(Vec<String>, String)> {
    if let Some(ref krate) = args.krate {
        let krate = krate.trim().to_string();
        return Ok((vec![krate.clone()], krate));
    }

    match args.infile {
        Some(ref infile) => {
            let packages = packages::load_package_list(infile, !args.no_header)?;
            let description = format!("{} crates from {}", packages.len(), infile.display());
            Ok((packages, description))
        }
        None => anyhow::bail!("No crate or crate list given"),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
