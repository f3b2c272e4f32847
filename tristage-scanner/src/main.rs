//! Tristage - three-stage technical stock screener.
//!
//! Discovers candidates, evaluates each one through the volatility, trend and
//! momentum stages, and writes the survivors as a report or watchlist.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tristage_common::config::{parse_flag, Config, ProviderKind};
use tristage_common::error::Error;
use tristage_common::logging::init_logging_with_exclusions;
use tristage_scanner::discovery::StaticSymbols;
use tristage_scanner::screener::{ProgressCallback, ScanProgress};
use tristage_scanner::{
    build_provider, build_symbol_source, ReportFormat, ScanEngine, ScanReport,
};

/// Exit code for a run that had no candidates to evaluate.
const EXIT_NO_CANDIDATES: u8 = 2;

/// Three-stage technical screener: weekly volatility conditions, trend
/// pullbacks and momentum confirmation.
#[derive(Parser, Debug)]
#[command(name = "tristage")]
#[command(version)]
#[command(about = "Three-stage technical stock screener", long_about = None)]
struct Cli {
    /// Path to a config file (default: ~/.tristage/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scan and write the accepted symbols
    Scan {
        /// Comma-separated symbols to scan instead of listing discovery
        #[arg(long)]
        symbols: Option<String>,

        /// File with one symbol per line ('#' starts a comment)
        #[arg(long)]
        symbols_file: Option<PathBuf>,

        /// Read series from <DIR>/<SYMBOL>.json instead of the network
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Enable stage 1 (weekly volatility condition)
        #[arg(long, value_parser = parse_bool_arg)]
        stage1: Option<bool>,

        /// Enable stage 2 (trend and pullback)
        #[arg(long, value_parser = parse_bool_arg)]
        stage2: Option<bool>,

        /// Enable stage 3 (momentum confirmation)
        #[arg(long, value_parser = parse_bool_arg)]
        stage3: Option<bool>,

        /// Maximum symbols evaluated concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-symbol retrieval deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Output format (markdown, json, watchlist)
        #[arg(short, long, default_value = "watchlist")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print discovered candidate symbols, one per line
    Symbols,

    /// Print the effective configuration as JSON
    Config,
}

fn parse_bool_arg(value: &str) -> std::result::Result<bool, String> {
    parse_flag(value).ok_or_else(|| format!("expected true/false, got '{}'", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(failure_exit_code(&e))
        }
    }
}

/// Exit code for a failed run: the common error's code when there is one,
/// otherwise 1.
fn failure_exit_code(error: &anyhow::Error) -> u8 {
    error.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path).map(|mut config| {
            config.apply_env_overrides();
            config
        }),
        None => Config::load_with_env(),
    };
    let mut config = loaded.map_err(|e| Error::Config(format!("{:#}", e)))?;
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    match cli.command {
        Commands::Scan {
            symbols,
            symbols_file,
            snapshot_dir,
            stage1,
            stage2,
            stage3,
            concurrency,
            timeout_secs,
            format,
            output,
        } => {
            if let Some(on) = stage1 {
                config.scanner.stages.stage1_enabled = on;
            }
            if let Some(on) = stage2 {
                config.scanner.stages.stage2_enabled = on;
            }
            if let Some(on) = stage3 {
                config.scanner.stages.stage3_enabled = on;
            }
            if let Some(n) = concurrency {
                config.scanner.concurrency = n;
            }
            if let Some(secs) = timeout_secs {
                config.scanner.symbol_timeout_secs = secs;
            }
            if let Some(dir) = snapshot_dir {
                config.provider.kind = ProviderKind::Snapshot;
                config.provider.snapshot_dir = Some(dir);
            }

            init(&config)?;
            run_scan(&config, symbols, symbols_file, format, output).await
        }
        Commands::Symbols => {
            init(&config)?;
            let source = build_symbol_source(&config.discovery);
            match source.discover_symbols().await {
                Ok(symbols) if !symbols.is_empty() => {
                    for symbol in symbols {
                        println!("{}", symbol);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Ok(_) => {
                    tracing::warn!("Discovery returned no symbols");
                    Ok(ExitCode::from(EXIT_NO_CANDIDATES))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Symbol discovery failed");
                    Ok(ExitCode::from(EXIT_NO_CANDIDATES))
                }
            }
        }
        Commands::Config => {
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Validate the configuration and start logging.
fn init(config: &Config) -> Result<()> {
    config
        .validate()
        .map_err(|e| Error::from(e).with_context("Invalid configuration"))?;
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    tracing::info!("Tristage v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

async fn run_scan(
    config: &Config,
    symbols: Option<String>,
    symbols_file: Option<PathBuf>,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let provider = build_provider(&config.provider)?;

    let progress: ProgressCallback = Arc::new(|p: &ScanProgress| {
        if p.completed == p.total || p.completed % 25 == 0 {
            tracing::info!(completed = p.completed, total = p.total, "Scan progress");
        }
    });
    let engine = ScanEngine::new(config.scanner.clone(), provider).with_progress(progress);

    let cancel = engine.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling remaining symbols");
            cancel.cancel();
        }
    });

    let outcome = if symbols.is_some() || symbols_file.is_some() {
        let mut list = StaticSymbols::from_csv(symbols.as_deref().unwrap_or_default());
        if let Some(path) = &symbols_file {
            list.extend(StaticSymbols::from_file(path)?);
        }
        if list.is_empty() {
            tracing::warn!("Explicit symbol list is empty");
        } else {
            tracing::info!(count = list.len(), "Using explicit symbol list");
        }
        engine.run_discovered(&list).await
    } else {
        let source = build_symbol_source(&config.discovery);
        engine.run_discovered(source.as_ref()).await
    };

    tracing::info!("{}", outcome.summary());

    if outcome.total_candidates == 0 {
        tracing::warn!("No candidates to evaluate");
        return Ok(ExitCode::from(EXIT_NO_CANDIDATES));
    }
    if outcome.is_empty() {
        tracing::info!("No symbols passed the enabled stages");
    }

    let report = ScanReport::new(outcome);
    match output {
        Some(path) => {
            let written = report.save_to_file(&path, format)?;
            tracing::info!(path = %written.display(), format = %format, "Report written");
        }
        None => {
            let content = report.generate(format);
            if !content.is_empty() {
                println!("{}", content);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
