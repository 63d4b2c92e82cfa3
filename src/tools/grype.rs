//! Grype adapter - CVE scanning of downloaded dependency manifests
//!
//! Discovers manifests by exact filename match over the flat working
//! directory (the downloader never creates subdirectories) and runs one
//! `grype` invocation per manifest. No manifests is a normal `ok` outcome
//! with zero findings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use super::{ToolAdapter, diagnostic, resolve_binary};
use crate::domain::{Finding, FindingKind, Severity, ToolResult};
use crate::download::MANIFEST_FILENAMES;
use crate::exec;

pub struct GrypeAdapter {
    binary: String,
}

#[derive(Debug, Deserialize)]
struct GrypeOutput {
    matches: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct GrypeMatch {
    vulnerability: GrypeVulnerability,
    artifact: GrypeArtifact,
}

#[derive(Debug, Deserialize)]
struct GrypeVulnerability {
    id: String,
    severity: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrypeArtifact {
    name: String,
    version: String,
}

impl GrypeAdapter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ToolAdapter for GrypeAdapter {
    fn name(&self) -> &'static str {
        "grype"
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
            tracing::warn!("grype not found, skipping dependency scan");
            return ToolResult::missing(&self.binary);
        };

        let manifests = find_manifests(workdir);
        if manifests.is_empty() {
            tracing::info!("no dependency manifests downloaded, nothing for grype to scan");
            return ToolResult::ok(Vec::new(), 0);
        }

        let mut findings = Vec::new();
        let mut unmapped = 0usize;
        let mut seen = HashSet::new();

        for manifest in &manifests {
            tracing::info!("scanning dependency manifest {}", manifest);
            let args = vec![
                manifest.clone(),
                "-o".to_string(),
                "json".to_string(),
                "--quiet".to_string(),
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
            if outcome.exit_code != Some(0) {
                tracing::debug!("grype stderr: {}", outcome.stderr);
                return ToolResult::execution_error(format!(
                    "grype ({manifest}) exited with {:?}: {}",
                    outcome.exit_code,
                    diagnostic(&outcome.stdout, &outcome.stderr)
                ));
            }

            let output: GrypeOutput = match serde_json::from_str(&outcome.stdout) {
                Ok(output) => output,
                Err(e) => {
                    return ToolResult::execution_error(format!(
                        "unparseable grype output ({manifest}): {e}: {}",
                        diagnostic(&outcome.stdout, "")
                    ));
                }
            };

            for raw in output.matches {
                let item: GrypeMatch = match serde_json::from_value(raw.clone()) {
                    Ok(item) => item,
                    Err(e) => {
                        return ToolResult::execution_error(format!(
                            "malformed grype match ({manifest}): {e}"
                        ));
                    }
                };

                // The same vulnerable package can be matched through several
                // manifests (a lockfile and its package.json).
                let key = (
                    item.vulnerability.id.clone(),
                    item.artifact.name.clone(),
                    item.artifact.version.clone(),
                );
                if !seen.insert(key) {
                    continue;
                }

                let native = item.vulnerability.severity.as_deref().unwrap_or("");
                let severity = match map_severity(native) {
                    Some(severity) => severity,
                    None => {
                        tracing::warn!("unmapped grype severity {:?}", native);
                        unmapped += 1;
                        Severity::Info
                    }
                };

                let description = format!(
                    "{} {}: {}",
                    item.artifact.name,
                    item.artifact.version,
                    item.vulnerability
                        .description
                        .as_deref()
                        .unwrap_or("no description available")
                        .trim()
                );

                findings.push(
                    Finding::new(
                        FindingKind::Vulnerability,
                        item.vulnerability.id,
                        severity,
                        description,
                    )
                    .with_location(manifest.clone(), None)
                    .with_raw(raw),
                );
            }
        }

        tracing::info!("grype reported {} vulnerabilities", findings.len());
        ToolResult::ok(findings, unmapped)
    }
}

/// Dependency manifests persisted by the downloader, by exact filename.
fn find_manifests(workdir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(workdir) else {
        return Vec::new();
    };
    let mut manifests: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| MANIFEST_FILENAMES.contains(&name.as_str()))
        .collect();
    manifests.sort();
    manifests
}

/// Grype reports Critical/High/Medium/Low/Negligible.
fn map_severity(native: &str) -> Option<Severity> {
    match native.to_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "high" => Some(Severity::High),
        "medium" => Some(Severity::Medium),
        "low" => Some(Severity::Low),
        "negligible" => Some(Severity::Info),
        _ => None,
    }
}
