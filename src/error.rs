//! Run-level error taxonomy
//!
//! Only two conditions abort a scan run: failing to acquire the root document
//! and failing to write the report artifacts. Everything per-asset or
//! per-tool is captured as structured data inside the report instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The target's root document could not be fetched. Without it there is
    /// nothing to scan, so the run fails fast.
    #[error("failed to acquire {url}: {reason}")]
    Acquisition { url: String, reason: String },

    /// An output artifact could not be written.
    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled before completion. No artifacts are produced.
    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    pub fn acquisition(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Acquisition {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
