//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Pipeline settings.
///
/// Resolution order: built-in defaults, then `srcscan.toml` if present, then
/// `SRCSCAN_*` environment variables, then CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where report artifacts are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parent directory for per-run working directories
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Per-asset size cap in bytes. Oversized assets are rejected and
    /// recorded as skipped, never truncated.
    #[serde(default = "default_max_asset_size")]
    pub max_asset_size: u64,

    /// Maximum number of assets persisted per run
    #[serde(default = "default_max_assets")]
    pub max_assets: usize,

    /// Per-request download timeout in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Per-invocation tool timeout in seconds
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Semgrep registry rulesets to run, one invocation each
    #[serde(default = "default_semgrep_rules")]
    pub semgrep_rules: Vec<String>,

    /// Executable names (or paths), resolved at run time
    #[serde(default = "default_semgrep_binary")]
    pub semgrep_binary: String,
    #[serde(default = "default_grype_binary")]
    pub grype_binary: String,
    #[serde(default = "default_trufflehog_binary")]
    pub trufflehog_binary: String,

    /// Keep the working directory after the run instead of deleting it
    #[serde(default)]
    pub keep_temp: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_max_asset_size() -> u64 {
    2 * 1024 * 1024
}

fn default_max_assets() -> usize {
    50
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_scan_timeout_secs() -> u64 {
    180
}

fn default_semgrep_rules() -> Vec<String> {
    [
        "p/javascript",
        "p/security-audit",
        "p/owasp-top-ten",
        "p/xss",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_semgrep_binary() -> String {
    "semgrep".to_string()
}

fn default_grype_binary() -> String {
    "grype".to_string()
}

fn default_trufflehog_binary() -> String {
    "trufflehog".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            max_asset_size: default_max_asset_size(),
            max_assets: default_max_assets(),
            download_timeout_secs: default_download_timeout_secs(),
            scan_timeout_secs: default_scan_timeout_secs(),
            semgrep_rules: default_semgrep_rules(),
            semgrep_binary: default_semgrep_binary(),
            grype_binary: default_grype_binary(),
            trufflehog_binary: default_trufflehog_binary(),
            keep_temp: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Load settings from a directory, looking for `srcscan.toml`.
    /// Falls back to defaults when no file exists.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("srcscan.toml");
        if path.exists() {
            return Self::from_file(&path);
        }
        Ok(Self::default())
    }

    /// Apply `SRCSCAN_*` environment variable overrides.
    /// Unparseable values are ignored with a warning rather than aborting.
    pub fn apply_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("SRCSCAN_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SRCSCAN_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
        if let Some(size) = env_parse("SRCSCAN_MAX_ASSET_SIZE") {
            self.max_asset_size = size;
        }
        if let Some(count) = env_parse("SRCSCAN_MAX_ASSETS") {
            self.max_assets = count;
        }
        if let Some(secs) = env_parse("SRCSCAN_DOWNLOAD_TIMEOUT") {
            self.download_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("SRCSCAN_SCAN_TIMEOUT") {
            self.scan_timeout_secs = secs;
        }
        self
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring unparseable {}={}", name, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert_eq!(settings.max_assets, 50);
        assert_eq!(settings.download_timeout(), Duration::from_secs(30));
        assert!(!settings.semgrep_rules.is_empty());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let settings: Settings =
            toml::from_str("max_assets = 5\nsemgrep_binary = \"/opt/semgrep\"").unwrap();
        assert_eq!(settings.max_assets, 5);
        assert_eq!(settings.semgrep_binary, "/opt/semgrep");
        assert_eq!(settings.scan_timeout_secs, 180);
    }

    #[test]
    fn from_dir_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_dir(dir.path()).unwrap();
        assert_eq!(settings.max_asset_size, 2 * 1024 * 1024);
    }
}
