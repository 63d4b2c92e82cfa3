//! Scan pipeline orchestration
//!
//! One run: create a scoped working directory, download the target's assets
//! into it, fan the three tool adapters out as concurrent tasks over the
//! read-only directory, wait for all of them to reach a terminal state, then
//! fold everything into one `ScanReport`. The downloader is the only writer
//! to the working directory and finishes before any adapter starts.

use std::path::Path;

use reqwest::Url;
use tempfile::TempDir;
use tokio::sync::watch;

use crate::config::Settings;
use crate::domain::{ScanReport, ToolResult, overall_summary};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::ScanError;
use crate::tools::{GrypeAdapter, SemgrepAdapter, ToolAdapter, TrufflehogAdapter};

/// Scoped working directory for one run.
///
/// Removed on drop on every exit path, including early return on downloader
/// failure, unless retention was requested.
pub struct WorkDir {
    dir: Option<TempDir>,
    keep: bool,
}

impl WorkDir {
    pub fn create(parent: &Path, keep: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix("scan_").tempdir_in(parent)?;
        Ok(Self {
            dir: Some(dir),
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .expect("working directory alive until drop")
            .path()
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            if let Some(dir) = self.dir.take() {
                let path = dir.keep();
                tracing::info!("keeping working directory {}", path.display());
            }
        }
    }
}

/// Run the full pipeline for one target and return the unified report.
///
/// Only the root-document fetch aborts the run; per-asset and per-tool
/// failures are captured inside the report. A cancelled run returns
/// `ScanError::Cancelled` and never produces a report.
pub async fn run_scan(
    settings: &Settings,
    target: &Url,
    cancel: watch::Receiver<bool>,
) -> Result<ScanReport, ScanError> {
    if *cancel.borrow() {
        return Err(ScanError::Cancelled);
    }

    let scan_timestamp = chrono::Local::now().to_rfc3339();

    let workdir = WorkDir::create(&settings.temp_dir, settings.keep_temp).map_err(|e| {
        ScanError::acquisition(target.as_str(), format!("cannot create working directory: {e}"))
    })?;

    let downloader = Downloader::new(
        settings.download_timeout(),
        settings.max_asset_size,
        settings.max_assets,
    );
    let download = downloader.fetch(target, workdir.path()).await?;

    if *cancel.borrow() {
        return Err(ScanError::Cancelled);
    }

    let semgrep = SemgrepAdapter::new(&settings.semgrep_binary, &settings.semgrep_rules);
    let grype = GrypeAdapter::new(&settings.grype_binary);
    let trufflehog = TrufflehogAdapter::new(&settings.trufflehog_binary);

    // Fan-out/fan-in barrier: all three adapters read the now-stable working
    // directory concurrently and must reach a terminal state before
    // aggregation.
    let timeout = settings.scan_timeout();
    let (semgrep_results, grype_results, trufflehog_results) = tokio::join!(
        semgrep.run(workdir.path(), timeout, cancel.clone()),
        grype.run(workdir.path(), timeout, cancel.clone()),
        trufflehog.run(workdir.path(), timeout, cancel.clone()),
    );

    if *cancel.borrow() {
        return Err(ScanError::Cancelled);
    }

    Ok(aggregate(
        target.as_str(),
        &scan_timestamp,
        download,
        semgrep_results,
        grype_results,
        trufflehog_results,
    ))
}

/// Fold download results and the three tool results into one report.
///
/// Pure and order-independent: the same inputs always produce an identical
/// report, so re-aggregation is idempotent. The timestamp is an input, not
/// read from a clock here.
pub fn aggregate(
    target_url: &str,
    scan_timestamp: &str,
    download: DownloadOutcome,
    semgrep_results: ToolResult,
    grype_results: ToolResult,
    trufflehog_results: ToolResult,
) -> ScanReport {
    let overall_summary = overall_summary(
        &download.assets,
        [&semgrep_results, &grype_results, &trufflehog_results],
    );

    ScanReport {
        target_url: target_url.to_string(),
        scan_timestamp: scan_timestamp.to_string(),
        downloaded_files: download.assets,
        skipped_files: download.skipped,
        semgrep_results,
        grype_results,
        trufflehog_results,
        overall_summary,
    }
}
