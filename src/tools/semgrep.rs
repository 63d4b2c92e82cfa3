//! Semgrep adapter - static analysis of downloaded sources
//!
//! Runs one `semgrep scan` per configured ruleset and merges the results,
//! deduplicating findings reported by more than one ruleset. Semgrep exits 1
//! when findings are present, so both 0 and 1 are parse-worthy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use super::{ToolAdapter, diagnostic, resolve_binary};
use crate::domain::{Finding, FindingKind, Severity, ToolResult};
use crate::exec;

pub struct SemgrepAdapter {
    binary: String,
    rules: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SemgrepOutput {
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SemgrepItem {
    check_id: String,
    path: String,
    start: SemgrepPosition,
    extra: SemgrepExtra,
}

#[derive(Debug, Deserialize)]
struct SemgrepPosition {
    line: u32,
}

#[derive(Debug, Deserialize)]
struct SemgrepExtra {
    message: String,
    severity: String,
    metadata: Option<SemgrepMetadata>,
}

#[derive(Debug, Deserialize)]
struct SemgrepMetadata {
    confidence: Option<String>,
}

impl SemgrepAdapter {
    pub fn new(binary: impl Into<String>, rules: &[String]) -> Self {
        Self {
            binary: binary.into(),
            rules: rules.to_vec(),
        }
    }
}

#[async_trait]
impl ToolAdapter for SemgrepAdapter {
    fn name(&self) -> &'static str {
        "semgrep"
    }

    fn locate(&self) -> Option<PathBuf> {
        resolve_binary(&self.binary)
    }

    async fn run(
        &self,
        workdir: &Path,
        timeout: Duration,
        cancel: watch::Receiver<bool>,
    ) -> ToolResult {
        let Some(program) = self.locate() else {
            tracing::warn!("semgrep not found, skipping static analysis");
            return ToolResult::missing(&self.binary);
        };

        let mut findings = Vec::new();
        let mut unmapped = 0usize;
        let mut seen = HashSet::new();

        // One invocation per ruleset; each gets the full timeout.
        for ruleset in &self.rules {
            tracing::info!("running semgrep with ruleset {}", ruleset);
            let args = vec![
                "scan".to_string(),
                "--config".to_string(),
                ruleset.clone(),
                "--json".to_string(),
                "--no-git-ignore".to_string(),
                "--quiet".to_string(),
                ".".to_string(),
            ];

            let outcome =
                match exec::run_tool(&program, &args, workdir, timeout, cancel.clone()).await {
                    Ok(outcome) => outcome,
                    Err(e) => return ToolResult::execution_error(format!("{e:#}")),
                };

            if outcome.timed_out {
                return ToolResult::timeout(&self.binary, timeout.as_secs());
            }
            if outcome.cancelled {
                return ToolResult::execution_error("run cancelled");
            }
            // Exit 1 is semgrep's findings-present convention.
            match outcome.exit_code {
                Some(0) | Some(1) => {}
                code => {
                    tracing::debug!("semgrep stderr: {}", outcome.stderr);
                    return ToolResult::execution_error(format!(
                        "semgrep ({ruleset}) exited with {code:?}: {}",
                        diagnostic(&outcome.stdout, &outcome.stderr)
                    ));
                }
            }

            let output: SemgrepOutput = match serde_json::from_str(&outcome.stdout) {
                Ok(output) => output,
                Err(e) => {
                    return ToolResult::execution_error(format!(
                        "unparseable semgrep output ({ruleset}): {e}: {}",
                        diagnostic(&outcome.stdout, "")
                    ));
                }
            };

            for raw in output.results {
                let item: SemgrepItem = match serde_json::from_value(raw.clone()) {
                    Ok(item) => item,
                    Err(e) => {
                        return ToolResult::execution_error(format!(
                            "malformed semgrep result ({ruleset}): {e}"
                        ));
                    }
                };

                let file_path = item.path.trim_start_matches("./").to_string();
                // Rulesets overlap; keep the first report of each issue.
                if !seen.insert((file_path.clone(), item.start.line, item.check_id.clone())) {
                    continue;
                }

                let severity = match map_severity(&item.extra.severity) {
                    Some(severity) => severity,
                    None => {
                        tracing::warn!("unmapped semgrep severity {:?}", item.extra.severity);
                        unmapped += 1;
                        Severity::Info
                    }
                };

                let mut description = item.extra.message.trim().to_string();
                if let Some(confidence) = item
                    .extra
                    .metadata
                    .as_ref()
                    .and_then(|m| m.confidence.as_deref())
                {
                    description.push_str(&format!(" (confidence: {confidence})"));
                }

                findings.push(
                    Finding::new(FindingKind::StaticIssue, item.check_id, severity, description)
                        .with_location(file_path, Some(item.start.line))
                        .with_raw(raw),
                );
            }
        }

        tracing::info!("semgrep reported {} findings", findings.len());
        ToolResult::ok(findings, unmapped)
    }
}

/// Semgrep reports ERROR/WARNING/INFO.
fn map_severity(native: &str) -> Option<Severity> {
    match native.to_uppercase().as_str() {
        "ERROR" => Some(Severity::High),
        "WARNING" => Some(Severity::Medium),
        "INFO" => Some(Severity::Low),
        _ => None,
    }
}
