//! Core domain types for srcscan

mod finding;
mod report;

pub use finding::{Finding, FindingKind, SEVERITY_ORDER, Severity, ToolResult, ToolStatus, ToolSummary};
pub use report::{Asset, OverallSummary, ScanReport, SkippedAsset, overall_summary};
