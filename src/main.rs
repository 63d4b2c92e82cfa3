use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

mod cli;

use srcscan::config::Settings;

#[derive(Parser)]
#[command(name = "srcscan")]
#[command(
    about = "Scans a site's client-side source for vulnerabilities, vulnerable dependencies, and leaked secrets"
)]
#[command(version)]
struct Cli {
    /// Target URL to scan (bare hostnames are promoted to https)
    #[arg(short, long)]
    url: String,

    /// Output directory for report artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for per-run working directories
    #[arg(short, long)]
    temp: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Keep the working directory after the run
    #[arg(long)]
    keep_temp: bool,

    /// Path to the config file (defaults to srcscan.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Defaults, then config file, then environment, then flags.
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::from_dir(Path::new("."))?,
    }
    .apply_env();

    if let Some(output) = cli.output {
        settings.output_dir = output;
    }
    if let Some(temp) = cli.temp {
        settings.temp_dir = temp;
    }
    settings.keep_temp |= cli.keep_temp;

    let url = if cli.url.starts_with("http://") || cli.url.starts_with("https://") {
        cli.url.clone()
    } else {
        format!("https://{}", cli.url)
    };
    let url =
        reqwest::Url::parse(&url).with_context(|| format!("invalid target URL: {}", cli.url))?;

    // One cancellation signal for the whole run; Ctrl-C kills every in-flight
    // subprocess before any artifact is written.
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling scan");
            let _ = cancel_tx.send(true);
        }
    });

    cli::scan::scan_command(settings, url, cancel_rx).await
}
