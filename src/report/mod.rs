//! Report emission
//!
//! Serializes one `ScanReport` into two artifacts: a structured JSON document
//! (`result_<ts>.json`) and a human-readable Markdown document
//! (`report_<ts>.md`). Both derive from the same immutable report, and both
//! filenames embed the scan timestamp so prior runs are never overwritten.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::domain::{SEVERITY_ORDER, ScanReport, Severity, ToolResult, ToolStatus};
use crate::error::ScanError;

/// Per-severity sections list at most this many findings; the rest are
/// summarized as a count.
const MAX_PER_BAND: usize = 10;

#[derive(Debug)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub struct ReportEmitter {
    output_dir: PathBuf,
}

impl ReportEmitter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write both artifacts. An unwritable output directory is fatal.
    pub fn emit(&self, report: &ScanReport) -> Result<ReportPaths, ScanError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| ScanError::ReportWrite {
            path: self.output_dir.clone(),
            source: e,
        })?;

        let stamp = filename_stamp(&report.scan_timestamp);

        let json_path = self.output_dir.join(format!("result_{stamp}.json"));
        let json = serde_json::to_string_pretty(report).map_err(|e| ScanError::ReportWrite {
            path: json_path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(&json_path, json).map_err(|e| ScanError::ReportWrite {
            path: json_path.clone(),
            source: e,
        })?;
        tracing::info!("wrote structured report {}", json_path.display());

        let markdown_path = self.output_dir.join(format!("report_{stamp}.md"));
        std::fs::write(&markdown_path, render_markdown(report)).map_err(|e| {
            ScanError::ReportWrite {
                path: markdown_path.clone(),
                source: e,
            }
        })?;
        tracing::info!("wrote scan report {}", markdown_path.display());

        Ok(ReportPaths {
            json: json_path,
            markdown: markdown_path,
        })
    }
}

/// RFC-3339 timestamp to a filesystem-safe `YYYYmmdd_HHMMSS` stamp.
fn filename_stamp(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|_| {
            timestamp
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect()
        })
}

/// Overall risk is the highest severity present anywhere; a clean report
/// rolls up to low.
fn risk_level(report: &ScanReport) -> Severity {
    report.highest_severity().unwrap_or(Severity::Low)
}

fn status_text(result: &ToolResult) -> &'static str {
    match result.status {
        ToolStatus::Ok => "completed",
        ToolStatus::ToolMissing => "not installed",
        ToolStatus::ExecutionError => "failed to run",
        ToolStatus::Timeout => "timed out",
    }
}

/// Render the human-readable document: executive summary, completeness,
/// findings grouped by tool then severity, recommendations.
pub fn render_markdown(report: &ScanReport) -> String {
    let mut out = String::new();
    let summary = &report.overall_summary;

    out.push_str("# Security Scan Report\n\n");
    let _ = writeln!(out, "- **Target:** {}", report.target_url);
    let _ = writeln!(out, "- **Scan date:** {}", report.scan_timestamp);
    out.push_str(
        "- **Tools:** semgrep (static analysis), grype (dependency CVEs), \
         trufflehog (secret detection)\n\n",
    );

    out.push_str("## Executive Summary\n\n");
    out.push_str("| Metric | Count |\n|---|---|\n");
    let _ = writeln!(out, "| Files scanned | {} |", summary.total_files);
    let _ = writeln!(out, "| Static analysis issues | {} |", summary.total_issues);
    let _ = writeln!(
        out,
        "| Dependency vulnerabilities | {} |",
        summary.total_vulnerabilities
    );
    let _ = writeln!(out, "| Secrets / credentials | {} |", summary.total_secrets);
    let _ = writeln!(out, "| Total findings | {} |", summary.total_findings());
    out.push('\n');

    let _ = writeln!(
        out,
        "**Overall risk level: {}**\n",
        risk_level(report).as_str().to_uppercase()
    );

    out.push_str("## Scan Completeness\n\n");
    out.push_str("| Tool | Status | Findings |\n|---|---|---|\n");
    for (name, result) in report.tool_results() {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            name,
            status_text(result),
            result.summary.total
        );
    }
    out.push('\n');
    if !report.degraded_tools().is_empty() {
        let _ = writeln!(
            out,
            "Tools that did not complete contributed no findings; the results \
             below cover the remaining tools only.\n"
        );
    }
    if !report.skipped_files.is_empty() {
        let _ = writeln!(
            out,
            "{} discovered asset(s) could not be downloaded and were not \
             scanned.\n",
            report.skipped_files.len()
        );
    }

    render_tool_section(
        &mut out,
        "Static Analysis (semgrep)",
        &report.semgrep_results,
        "potential security issues in the downloaded sources",
    );
    render_tool_section(
        &mut out,
        "Dependency Vulnerabilities (grype)",
        &report.grype_results,
        "known vulnerabilities in declared dependencies",
    );
    render_tool_section(
        &mut out,
        "Secret Detection (trufflehog)",
        &report.trufflehog_results,
        "credentials and secrets exposed in client-side code",
    );

    out.push_str("## Recommendations\n\n");
    for (index, recommendation) in recommendations(report).iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, recommendation);
    }

    out
}

fn render_tool_section(out: &mut String, title: &str, result: &ToolResult, blurb: &str) {
    let _ = writeln!(out, "## {title}\n");

    if result.status != ToolStatus::Ok {
        let _ = writeln!(out, "This scanner {}.\n", status_text(result));
        return;
    }

    let _ = writeln!(
        out,
        "Identified {} {}.\n",
        result.findings.len(),
        blurb
    );
    if result.summary.unmapped > 0 {
        let _ = writeln!(
            out,
            "{} finding(s) carried a severity this report does not recognize \
             and were filed under info.\n",
            result.summary.unmapped
        );
    }

    for severity in SEVERITY_ORDER {
        let band: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if band.is_empty() {
            continue;
        }

        let _ = writeln!(
            out,
            "### {} ({})\n",
            severity_heading(severity),
            band.len()
        );
        for finding in band.iter().take(MAX_PER_BAND) {
            let location = match finding.line {
                Some(line) => format!("{}:{}", finding.file_path, line),
                None => finding.file_path.clone(),
            };
            let _ = writeln!(
                out,
                "- `{}` {} - {}",
                finding.rule_id, location, finding.description
            );
        }
        if band.len() > MAX_PER_BAND {
            let _ = writeln!(out, "- ... and {} more", band.len() - MAX_PER_BAND);
        }
        out.push('\n');
    }
}

fn severity_heading(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
        Severity::Info => "Informational",
    }
}

fn recommendations(report: &ScanReport) -> Vec<String> {
    let mut recommendations = vec![
        "Review code changes for security impact before deploying to production.".to_string(),
        "Serve a Content Security Policy to limit the blast radius of injected scripts."
            .to_string(),
        "Keep third-party dependencies updated to their latest secure versions.".to_string(),
    ];

    if !report.semgrep_results.findings.is_empty() {
        recommendations
            .push("Fix the statically-detected issues, highest severity first.".to_string());
    }
    if !report.grype_results.findings.is_empty() {
        recommendations.push(
            "Upgrade the vulnerable packages listed above and add dependency scanning to CI."
                .to_string(),
        );
    }
    if !report.trufflehog_results.findings.is_empty() {
        recommendations.push(
            "Rotate every exposed credential immediately; a secret shipped to the browser is \
             public."
                .to_string(),
        );
        recommendations.push(
            "Move secrets out of client-side code into server-side configuration.".to_string(),
        );
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, Finding, FindingKind, OverallSummary, overall_summary};

    fn sample_report() -> ScanReport {
        let semgrep = ToolResult::ok(
            vec![
                Finding::new(
                    FindingKind::StaticIssue,
                    "javascript.browser.security.eval-detected",
                    Severity::High,
                    "Detected eval with a dynamic argument.",
                )
                .with_location("inline_0.js", Some(3)),
            ],
            0,
        );
        let grype = ToolResult::timeout("grype", 180);
        let trufflehog = ToolResult::ok(
            vec![
                Finding::new(
                    FindingKind::Secret,
                    "AWS Access Key",
                    Severity::High,
                    "AWS Access Key detected: AKIA************T7KA",
                )
                .with_location("inline_0.js", Some(1)),
            ],
            0,
        );

        let assets = vec![Asset::inline("inline_0.js")];
        let overall = overall_summary(&assets, [&semgrep, &grype, &trufflehog]);
        ScanReport {
            target_url: "https://example.com".into(),
            scan_timestamp: "2026-08-04T10:30:00+00:00".into(),
            downloaded_files: assets,
            skipped_files: vec![],
            semgrep_results: semgrep,
            grype_results: grype,
            trufflehog_results: trufflehog,
            overall_summary: overall,
        }
    }

    #[test]
    fn filename_stamp_embeds_the_scan_time() {
        assert_eq!(
            filename_stamp("2026-08-04T10:30:00+00:00"),
            "20260804_103000"
        );
    }

    #[test]
    fn markdown_groups_by_tool_then_severity() {
        let markdown = render_markdown(&sample_report());
        let semgrep_at = markdown.find("## Static Analysis (semgrep)").unwrap();
        let trufflehog_at = markdown.find("## Secret Detection (trufflehog)").unwrap();
        assert!(semgrep_at < trufflehog_at);
        assert!(markdown.contains("### High (1)"));
        assert!(markdown.contains("**Overall risk level: HIGH**"));
    }

    #[test]
    fn degraded_tool_is_visible_in_the_document() {
        let markdown = render_markdown(&sample_report());
        assert!(markdown.contains("| grype | timed out | 0 |"));
        assert!(markdown.contains("This scanner timed out."));
    }

    #[test]
    fn bands_are_capped_with_a_remainder_line() {
        let findings: Vec<Finding> = (0..13)
            .map(|i| {
                Finding::new(FindingKind::StaticIssue, format!("rule-{i}"), Severity::Low, "x")
                    .with_location("a.js", Some(i + 1))
            })
            .collect();
        let semgrep = ToolResult::ok(findings, 0);
        let report = ScanReport {
            semgrep_results: semgrep,
            grype_results: ToolResult::missing("grype"),
            trufflehog_results: ToolResult::missing("trufflehog"),
            overall_summary: OverallSummary::default(),
            ..sample_report()
        };

        let markdown = render_markdown(&report);
        assert!(markdown.contains("### Low (13)"));
        assert!(markdown.contains("- ... and 3 more"));
    }

    #[test]
    fn emit_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ReportEmitter::new(dir.path().join("output"));
        let paths = emitter.emit(&sample_report()).unwrap();

        assert!(paths.json.ends_with("result_20260804_103000.json"));
        assert!(paths.markdown.ends_with("report_20260804_103000.md"));

        let json = std::fs::read_to_string(&paths.json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target_url"], "https://example.com");
        assert_eq!(value["semgrep_results"]["status"], "ok");
        assert_eq!(value["grype_results"]["status"], "timeout");
        assert_eq!(value["overall_summary"]["total_secrets"], 1);
    }

    #[test]
    fn unwritable_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("output");
        std::fs::write(&blocker, "a file where a directory must go").unwrap();

        let emitter = ReportEmitter::new(&blocker);
        let result = emitter.emit(&sample_report());
        assert!(matches!(result, Err(ScanError::ReportWrite { .. })));
    }
}
