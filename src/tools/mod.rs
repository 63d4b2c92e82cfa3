//! Tool adapters for the three external scanners
//!
//! Each adapter wraps one scanner binary: it resolves the executable, builds
//! the invocation, runs it through the shared `exec` seam, and parses the
//! tool's native output into normalized findings. Adapters are total - every
//! failure mode (missing binary, bad exit, unparseable output, timeout) is
//! folded into the returned `ToolResult`, never propagated as an error.

mod grype;
mod semgrep;
mod trufflehog;

pub use grype::GrypeAdapter;
pub use semgrep::SemgrepAdapter;
pub use trufflehog::TrufflehogAdapter;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::ToolResult;

/// Contract shared by the three scanner adapters.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Tool name for logs and report labels
    fn name(&self) -> &'static str;

    /// Resolve the tool executable. `None` means the tool is not installed,
    /// which is an expected outcome, not an error.
    fn locate(&self) -> Option<PathBuf>;

    /// Run the tool against the fully-populated working directory.
    ///
    /// Adapters only read the working directory; they never write to it.
    async fn run(
        &self,
        workdir: &Path,
        timeout: Duration,
        cancel: watch::Receiver<bool>,
    ) -> ToolResult;
}

/// Resolve a configured binary: a bare name is looked up on PATH, anything
/// with a path separator is checked directly.
pub(crate) fn resolve_binary(binary: &str) -> Option<PathBuf> {
    let path = Path::new(binary);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(binary).ok()
}

/// Trim captured output to a bounded diagnostic string.
pub(crate) fn diagnostic(stdout: &str, stderr: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let mut detail: String = source.trim().chars().take(500).collect();
    if detail.is_empty() {
        detail = "no output".to_string();
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_missing_explicit_path() {
        assert!(resolve_binary("/nonexistent/dir/semgrep").is_none());
    }

    #[test]
    fn resolve_accepts_existing_explicit_path() {
        assert!(resolve_binary("/bin/sh").is_some());
    }

    #[test]
    fn resolve_rejects_unknown_name() {
        assert!(resolve_binary("srcscan-no-such-tool-xyz").is_none());
    }

    #[test]
    fn diagnostic_prefers_stderr() {
        assert_eq!(diagnostic("out", "err"), "err");
        assert_eq!(diagnostic("out", "  "), "out");
        assert_eq!(diagnostic("", ""), "no output");
    }
}
