//! Subprocess invocation seam shared by all tool adapters
//!
//! One external process call: spawn, capture stdout and stderr, enforce the
//! caller-side timeout, observe the run-wide cancellation signal. The child
//! is killed and reaped on timeout and on cancel; it is never trusted to
//! honor its own deadline.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;

/// Structured outcome of one tool invocation
#[derive(Debug)]
pub struct ExecOutcome {
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The process was killed after exceeding the timeout
    pub timed_out: bool,
    /// The process was killed by the run-wide cancellation signal
    pub cancelled: bool,
}

impl ExecOutcome {
    fn killed(timed_out: bool, cancelled: bool) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out,
            cancelled,
        }
    }
}

/// Run one external tool to completion, under a timeout and a cancel signal.
///
/// Returns `Err` only when the process cannot be spawned; every other outcome
/// (including timeout and cancellation) is a structured `ExecOutcome`.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
    cancel: watch::Receiver<bool>,
) -> Result<ExecOutcome> {
    tracing::debug!("running {} {:?} in {}", program.display(), args, cwd.display());

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program.display()))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture stdout pipe")?;
    let stderr = child
        .stderr
        .take()
        .context("Failed to capture stderr pipe")?;

    // Drain both pipes on their own tasks so the child never blocks on a
    // full pipe buffer while we wait on it.
    let stdout_task = tokio::spawn(read_to_string(stdout));
    let stderr_task = tokio::spawn(read_to_string(stderr));

    let status = tokio::select! {
        status = child.wait() => status.context("Failed to wait on child process")?,
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!("{} exceeded {}s timeout, killing", program.display(), timeout.as_secs());
            kill_and_reap(&mut child).await;
            return Ok(ExecOutcome::killed(true, false));
        }
        _ = cancelled(cancel) => {
            tracing::info!("cancellation requested, killing {}", program.display());
            kill_and_reap(&mut child).await;
            return Ok(ExecOutcome::killed(false, true));
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(ExecOutcome {
        exit_code: status.code(),
        stdout,
        stderr,
        timed_out: false,
        cancelled: false,
    })
}

async fn read_to_string(mut pipe: impl AsyncReadExt + Unpin) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn kill_and_reap(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Resolves when the cancel signal fires. If the sender side is gone the run
/// can no longer be cancelled, so this pends forever instead of resolving.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn no_cancel() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the duration of the test process.
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let outcome = run_tool(&sh(), &args, dir.path(), Duration::from_secs(5), no_cancel())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let outcome = run_tool(&sh(), &args, dir.path(), Duration::from_millis(200), no_cancel())
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
    }

    #[tokio::test]
    async fn kills_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let args = vec!["-c".to_string(), "sleep 30".to_string()];

        let handle = tokio::spawn({
            let dir = dir.path().to_path_buf();
            async move { run_tool(&sh(), &args, &dir, Duration::from_secs(30), rx).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.cancelled);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_tool(
            Path::new("/nonexistent/tool-xyz"),
            &[],
            dir.path(),
            Duration::from_secs(1),
            no_cancel(),
        )
        .await;
        assert!(result.is_err());
    }
}
