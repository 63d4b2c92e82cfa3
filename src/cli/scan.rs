//! Scan command implementation

use anyhow::Result;
use reqwest::Url;
use tokio::sync::watch;

use srcscan::config::Settings;
use srcscan::report::ReportEmitter;
use srcscan::{ScanReport, ToolStatus, pipeline};

/// Run the full pipeline for one target and print where the artifacts went.
pub async fn scan_command(
    settings: Settings,
    url: Url,
    cancel: watch::Receiver<bool>,
) -> Result<()> {
    println!("Scanning {url}");
    println!("Tools: semgrep | grype | trufflehog\n");

    let report = pipeline::run_scan(&settings, &url, cancel).await?;

    let emitter = ReportEmitter::new(&settings.output_dir);
    let paths = emitter.emit(&report)?;

    print_summary(&report);

    println!("\nStructured report: {}", paths.json.display());
    println!("Scan report:       {}", paths.markdown.display());

    Ok(())
}

fn print_summary(report: &ScanReport) {
    let summary = &report.overall_summary;
    let rule = "=".repeat(60);

    println!("{rule}");
    println!("Scan summary for {}", report.target_url);
    println!("{rule}");
    println!("Files scanned: {}", summary.total_files);
    if !report.skipped_files.is_empty() {
        println!("Assets skipped: {}", report.skipped_files.len());
    }

    for (name, result) in report.tool_results() {
        match result.status {
            ToolStatus::Ok => println!(
                "{name}: {} finding(s) ({} critical, {} high, {} medium)",
                result.summary.total,
                result.summary.critical,
                result.summary.high,
                result.summary.medium
            ),
            _ => println!("{name}: {}", result.status.as_str()),
        }
    }
    println!("{rule}");
}
