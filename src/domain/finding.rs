//! Normalized finding model shared by all tool adapters

use serde::{Deserialize, Serialize};

/// Severity levels on the shared ordered scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// All levels, highest first. Render order for reports.
pub const SEVERITY_ORDER: [Severity; 5] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Info,
];

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" | "crit" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "med" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Rank for ordering (0 = critical). Lower rank means more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    /// The more severe of two levels.
    pub fn max(self, other: Self) -> Self {
        if self.rank() <= other.rank() { self } else { other }
    }
}

/// What class of result a finding represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Static-analysis issue in downloaded source
    StaticIssue,
    /// Known vulnerability in a declared dependency
    Vulnerability,
    /// Leaked secret or credential
    Secret,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::StaticIssue => "static_issue",
            FindingKind::Vulnerability => "vulnerability",
            FindingKind::Secret => "secret",
        }
    }
}

/// One normalized result item from a scanning tool.
///
/// Immutable once produced. `raw` keeps the tool-native payload for
/// traceability; it is never re-interpreted after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// What kind of result this is
    pub kind: FindingKind,
    /// Rule / CVE / detector identifier
    pub rule_id: String,
    /// Normalized severity (or confidence, for secret detectors)
    pub severity: Severity,
    /// Path of the affected asset, relative to the working directory
    pub file_path: String,
    /// Line number if the tool reported one
    pub line: Option<u32>,
    /// Human-readable description
    pub description: String,
    /// Tool-native payload
    pub raw: serde_json::Value,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        rule_id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            rule_id: rule_id.into(),
            severity,
            file_path: String::new(),
            line: None,
            description: description.into(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_location(mut self, file_path: impl Into<String>, line: Option<u32>) -> Self {
        self.file_path = file_path.into();
        self.line = line;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Terminal state of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Tool ran and its output parsed
    Ok,
    /// Executable not found on PATH
    ToolMissing,
    /// Tool ran but failed or produced unparseable output
    ExecutionError,
    /// Tool exceeded its timeout and was terminated
    Timeout,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::ToolMissing => "tool_missing",
            ToolStatus::ExecutionError => "execution_error",
            ToolStatus::Timeout => "timeout",
        }
    }
}

/// Per-tool counts by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    /// Native severity values that had no mapping and defaulted to `info`.
    /// A non-zero count usually means the tool changed its output schema.
    pub unmapped: usize,
}

impl ToolSummary {
    pub fn from_findings(findings: &[Finding], unmapped: usize) -> Self {
        let mut summary = Self {
            total: findings.len(),
            unmapped,
            ..Self::default()
        };
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

/// Outcome of one tool for one scan run.
///
/// A degraded status (`tool_missing`, `execution_error`, `timeout`) carries no
/// findings but still counts as an attempted tool in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(rename = "results")]
    pub findings: Vec<Finding>,
    pub summary: ToolSummary,
    /// Diagnostic detail for degraded statuses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(findings: Vec<Finding>, unmapped: usize) -> Self {
        let summary = ToolSummary::from_findings(&findings, unmapped);
        Self {
            status: ToolStatus::Ok,
            findings,
            summary,
            error: None,
        }
    }

    pub fn missing(binary: &str) -> Self {
        Self {
            status: ToolStatus::ToolMissing,
            findings: Vec::new(),
            summary: ToolSummary::default(),
            error: Some(format!("executable '{binary}' not found")),
        }
    }

    pub fn execution_error(detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::ExecutionError,
            findings: Vec::new(),
            summary: ToolSummary::default(),
            error: Some(detail.into()),
        }
    }

    pub fn timeout(binary: &str, secs: u64) -> Self {
        Self {
            status: ToolStatus::Timeout,
            findings: Vec::new(),
            summary: ToolSummary::default(),
            error: Some(format!("'{binary}' exceeded the {secs}s timeout and was terminated")),
        }
    }

    /// Highest severity among this tool's findings, if any
    pub fn highest_severity(&self) -> Option<Severity> {
        self.findings
            .iter()
            .map(|f| f.severity)
            .reduce(Severity::max)
    }
}
