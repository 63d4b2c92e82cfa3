//! Unified scan report - the persisted result of one pipeline run

use serde::{Deserialize, Serialize};

use super::finding::{FindingKind, Severity, ToolResult, ToolStatus};

/// A file persisted to the working directory by the downloader.
///
/// `origin` is the source URL, or `"inline"` for script bodies lifted out of
/// the root document. `path` is relative to the working directory, which is
/// deleted at teardown; the report deliberately carries path and origin only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub path: String,
    pub origin: String,
}

impl Asset {
    pub const INLINE_ORIGIN: &'static str = "inline";

    pub fn remote(path: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
        }
    }

    pub fn inline(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            origin: Self::INLINE_ORIGIN.to_string(),
        }
    }
}

/// An asset that was discovered but not persisted.
///
/// Recorded rather than silently dropped so a report always shows what the
/// scanners did not see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAsset {
    pub origin: String,
    pub reason: String,
}

/// Totals across all three tools
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub total_files: usize,
    pub total_issues: usize,
    pub total_vulnerabilities: usize,
    pub total_secrets: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl OverallSummary {
    pub fn total_findings(&self) -> usize {
        self.total_issues + self.total_vulnerabilities + self.total_secrets
    }
}

/// The unified artifact for one scan run.
///
/// Assembled once by the aggregator and immutable afterwards; the emitter
/// derives both output documents from the same instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub target_url: String,
    /// ISO-8601, captured when the run started
    pub scan_timestamp: String,
    pub downloaded_files: Vec<Asset>,
    pub skipped_files: Vec<SkippedAsset>,
    pub semgrep_results: ToolResult,
    pub grype_results: ToolResult,
    pub trufflehog_results: ToolResult,
    pub overall_summary: OverallSummary,
}

impl ScanReport {
    /// All three tool results, paired with a display label
    pub fn tool_results(&self) -> [(&'static str, &ToolResult); 3] {
        [
            ("semgrep", &self.semgrep_results),
            ("grype", &self.grype_results),
            ("trufflehog", &self.trufflehog_results),
        ]
    }

    /// Tools that did not reach `ok` status
    pub fn degraded_tools(&self) -> Vec<&'static str> {
        self.tool_results()
            .into_iter()
            .filter(|(_, result)| result.status != ToolStatus::Ok)
            .map(|(name, _)| name)
            .collect()
    }

    /// Highest severity present across all tools, if any finding exists
    pub fn highest_severity(&self) -> Option<Severity> {
        self.tool_results()
            .into_iter()
            .filter_map(|(_, result)| result.highest_severity())
            .reduce(Severity::max)
    }
}

/// Fold the three tool results and the asset list into overall totals.
///
/// Order-independent: the counts depend only on each finding's (kind,
/// severity) pair.
pub fn overall_summary(
    assets: &[Asset],
    tools: [&ToolResult; 3],
) -> OverallSummary {
    let mut summary = OverallSummary {
        total_files: assets.len(),
        ..OverallSummary::default()
    };

    for result in tools {
        for finding in &result.findings {
            match finding.kind {
                FindingKind::StaticIssue => summary.total_issues += 1,
                FindingKind::Vulnerability => summary.total_vulnerabilities += 1,
                FindingKind::Secret => summary.total_secrets += 1,
            }
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::finding::Finding;

    fn finding(kind: FindingKind, severity: Severity) -> Finding {
        Finding::new(kind, "r", severity, "d").with_location("f.js", Some(1))
    }

    #[test]
    fn overall_summary_folds_kinds_and_severities() {
        let semgrep = ToolResult::ok(
            vec![
                finding(FindingKind::StaticIssue, Severity::High),
                finding(FindingKind::StaticIssue, Severity::Medium),
            ],
            0,
        );
        let grype = ToolResult::ok(vec![finding(FindingKind::Vulnerability, Severity::Critical)], 0);
        let trufflehog = ToolResult::missing("trufflehog");

        let assets = vec![Asset::inline("inline_0.js")];
        let summary = overall_summary(&assets, [&semgrep, &grype, &trufflehog]);

        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.total_issues, 2);
        assert_eq!(summary.total_vulnerabilities, 1);
        assert_eq!(summary.total_secrets, 0);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.total_findings(), 3);
    }

    #[test]
    fn totals_match_sum_of_tool_findings() {
        let semgrep = ToolResult::ok(vec![finding(FindingKind::StaticIssue, Severity::Low)], 0);
        let grype = ToolResult::timeout("grype", 1);
        let trufflehog = ToolResult::ok(vec![finding(FindingKind::Secret, Severity::High)], 0);

        let summary = overall_summary(&[], [&semgrep, &grype, &trufflehog]);
        let finding_count: usize = [&semgrep, &grype, &trufflehog]
            .iter()
            .map(|r| r.findings.len())
            .sum();
        assert_eq!(summary.total_findings(), finding_count);
    }

    #[test]
    fn highest_severity_spans_tools() {
        let report = ScanReport {
            target_url: "https://example.com".into(),
            scan_timestamp: "2026-01-01T00:00:00Z".into(),
            downloaded_files: vec![],
            skipped_files: vec![],
            semgrep_results: ToolResult::ok(
                vec![finding(FindingKind::StaticIssue, Severity::Medium)],
                0,
            ),
            grype_results: ToolResult::ok(
                vec![finding(FindingKind::Vulnerability, Severity::Critical)],
                0,
            ),
            trufflehog_results: ToolResult::missing("trufflehog"),
            overall_summary: OverallSummary::default(),
        };
        assert_eq!(report.highest_severity(), Some(Severity::Critical));
        assert_eq!(report.degraded_tools(), vec!["trufflehog"]);
    }
}
