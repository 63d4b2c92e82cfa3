//! Asset downloader
//!
//! Fetches a target's root document, extracts script sources and dependency
//! manifests, and persists each one to the run's working directory. The root
//! document is the only fatal fetch; every per-asset failure is recorded as
//! skipped and the run continues.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::domain::{Asset, SkippedAsset};
use crate::error::ScanError;

/// Dependency-manifest filenames the CVE scanner understands
pub const MANIFEST_FILENAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "npm-shrinkwrap.json",
    "bower.json",
];

/// Extensions worth handing to the scanners (scripts, config, certs)
const RELEVANT_EXTENSIONS: &[&str] = &[
    ".js", ".mjs", ".jsx", ".ts", ".tsx", ".json", ".map", ".env", ".txt", ".xml", ".yml",
    ".yaml", ".config", ".ini", ".properties",
];

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<script\b([^>]*)>(.*?)</script>"#).unwrap());
static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static HREF_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<(?:a|link)\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

/// What the downloader produced for one run
#[derive(Debug)]
pub struct DownloadOutcome {
    pub assets: Vec<Asset>,
    pub skipped: Vec<SkippedAsset>,
}

/// One discovered source, before fetching
#[derive(Debug, PartialEq)]
enum Source {
    External(Url),
    Inline(String),
}

pub struct Downloader {
    client: reqwest::Client,
    max_asset_size: u64,
    max_assets: usize,
}

impl Downloader {
    pub fn new(timeout: Duration, max_asset_size: u64, max_assets: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("reqwest client configuration is static");
        Self {
            client,
            max_asset_size,
            max_assets,
        }
    }

    /// Fetch the root document and every discovered asset into `workdir`.
    ///
    /// Fails only when the root document itself is unreachable or not 2xx.
    pub async fn fetch(&self, url: &Url, workdir: &Path) -> Result<DownloadOutcome, ScanError> {
        tracing::info!("fetching root document {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScanError::acquisition(url.as_str(), e))?
            .error_for_status()
            .map_err(|e| ScanError::acquisition(url.as_str(), e))?;

        // Redirects may have moved us; resolve relative references against
        // the final URL.
        let base = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ScanError::acquisition(url.as_str(), e))?;

        let sources = extract_sources(&html, &base);
        tracing::info!("discovered {} candidate sources", sources.len());

        let mut outcome = DownloadOutcome {
            assets: Vec::new(),
            skipped: Vec::new(),
        };
        let mut inline_index = 0usize;
        let mut used_names = HashSet::new();

        for source in sources {
            match source {
                Source::External(asset_url) => {
                    if outcome.assets.len() >= self.max_assets {
                        outcome.skipped.push(SkippedAsset {
                            origin: asset_url.to_string(),
                            reason: format!("asset limit of {} reached", self.max_assets),
                        });
                        continue;
                    }
                    // Manifest filenames are kept verbatim so the CVE scanner
                    // can discover them, which means two manifests from
                    // different paths would land on the same name. Keep the
                    // first, record the rest.
                    let name = asset_filename(&asset_url);
                    if !used_names.insert(name.clone()) {
                        outcome.skipped.push(SkippedAsset {
                            origin: asset_url.to_string(),
                            reason: format!("filename {name} already persisted"),
                        });
                        continue;
                    }
                    match self.fetch_asset(&asset_url).await {
                        Ok(bytes) => {
                            if let Err(reason) = write_asset(workdir, &name, &bytes) {
                                used_names.remove(&name);
                                outcome.skipped.push(SkippedAsset {
                                    origin: asset_url.to_string(),
                                    reason,
                                });
                                continue;
                            }
                            tracing::debug!("downloaded {} -> {}", asset_url, name);
                            outcome.assets.push(Asset::remote(name, asset_url.to_string()));
                        }
                        Err(reason) => {
                            tracing::warn!("skipping {}: {}", asset_url, reason);
                            used_names.remove(&name);
                            outcome.skipped.push(SkippedAsset {
                                origin: asset_url.to_string(),
                                reason,
                            });
                        }
                    }
                }
                Source::Inline(body) => {
                    if outcome.assets.len() >= self.max_assets {
                        outcome.skipped.push(SkippedAsset {
                            origin: Asset::INLINE_ORIGIN.to_string(),
                            reason: format!("asset limit of {} reached", self.max_assets),
                        });
                        continue;
                    }
                    if body.len() as u64 > self.max_asset_size {
                        outcome.skipped.push(SkippedAsset {
                            origin: Asset::INLINE_ORIGIN.to_string(),
                            reason: oversize_reason(body.len() as u64, self.max_asset_size),
                        });
                        continue;
                    }
                    let name = format!("inline_{inline_index}.js");
                    inline_index += 1;
                    if let Err(reason) = write_asset(workdir, &name, body.as_bytes()) {
                        outcome.skipped.push(SkippedAsset {
                            origin: Asset::INLINE_ORIGIN.to_string(),
                            reason,
                        });
                        continue;
                    }
                    outcome.assets.push(Asset::inline(name));
                }
            }
        }

        tracing::info!(
            "persisted {} assets ({} skipped)",
            outcome.assets.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Fetch one external asset, enforcing the size cap.
    /// Oversized content is rejected outright, never truncated.
    async fn fetch_asset(&self, url: &Url) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        if let Some(declared) = response.content_length() {
            if declared > self.max_asset_size {
                return Err(oversize_reason(declared, self.max_asset_size));
            }
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        if bytes.len() as u64 > self.max_asset_size {
            return Err(oversize_reason(bytes.len() as u64, self.max_asset_size));
        }

        Ok(bytes.to_vec())
    }
}

fn oversize_reason(actual: u64, cap: u64) -> String {
    format!("exceeds size cap ({actual} > {cap} bytes)")
}

fn write_asset(workdir: &Path, name: &str, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(workdir.join(name), bytes).map_err(|e| format!("write failed: {e}"))
}

/// Extract script sources, inline script bodies, and manifest/security
/// relevant link targets from the root document, in document order.
fn extract_sources(html: &str, base: &Url) -> Vec<Source> {
    let mut sources = Vec::new();
    let mut seen = HashSet::new();

    for captures in SCRIPT_TAG.captures_iter(html) {
        let attrs = &captures[1];
        if let Some(src) = SRC_ATTR.captures(attrs) {
            push_external(&mut sources, &mut seen, base, &src[1]);
        } else {
            let body = captures[2].trim();
            if !body.is_empty() {
                sources.push(Source::Inline(body.to_string()));
            }
        }
    }

    for captures in HREF_TAG.captures_iter(html) {
        let href = &captures[1];
        if is_security_relevant(href) {
            push_external(&mut sources, &mut seen, base, href);
        }
    }

    sources
}

fn push_external(sources: &mut Vec<Source>, seen: &mut HashSet<String>, base: &Url, reference: &str) {
    let Ok(resolved) = base.join(reference) else {
        tracing::debug!("ignoring unresolvable reference {:?}", reference);
        return;
    };
    match resolved.scheme() {
        "http" | "https" => {}
        other => {
            tracing::debug!("ignoring {}: scheme {}", reference, other);
            return;
        }
    }
    if seen.insert(resolved.to_string()) {
        sources.push(Source::External(resolved));
    }
}

/// Whether a reference looks worth scanning: a known manifest filename or a
/// security-relevant extension.
fn is_security_relevant(reference: &str) -> bool {
    // Strip query/fragment before inspecting the path.
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
        .to_lowercase();

    let filename = path.rsplit('/').next().unwrap_or(&path);
    if MANIFEST_FILENAMES.contains(&filename) {
        return true;
    }

    RELEVANT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Build a collision-free local filename for an external asset: an 8-hex
/// prefix of the origin URL's SHA-256, then the sanitized basename.
///
/// Manifest filenames keep their exact name (the CVE scanner discovers them
/// by filename); `fetch` skips later same-named manifests.
fn asset_filename(url: &Url) -> String {
    let basename = sanitize_filename(url.path());
    if MANIFEST_FILENAMES.contains(&basename.as_str()) {
        return basename;
    }

    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", &digest[..8], basename)
}

/// Sanitize a URL path into a safe local filename, defaulting the extension
/// when the path has none.
fn sanitize_filename(url_path: &str) -> String {
    let basename = url_path.rsplit('/').next().unwrap_or(url_path);
    let mut name: String = basename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();

    if name.is_empty() {
        name = "asset".to_string();
    }

    if !name.contains('.') {
        let lower = url_path.to_lowercase();
        let ext = if lower.contains("json") {
            ".json"
        } else if lower.contains("xml") {
            ".xml"
        } else if lower.contains("js") || lower.contains("javascript") {
            ".js"
        } else {
            ".txt"
        };
        name.push_str(ext);
    }

    if name.chars().count() > 100 {
        let (stem, ext) = match name.rfind('.') {
            Some(dot) => (name[..dot].to_string(), name[dot..].to_string()),
            None => (name.clone(), String::new()),
        };
        let keep = 96usize.saturating_sub(ext.chars().count());
        let stem: String = stem.chars().take(keep).collect();
        name = format!("{stem}{ext}");
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/app/index.html").unwrap()
    }

    #[test]
    fn extracts_external_and_inline_scripts() {
        let html = r#"
            <html><head>
            <script src="/static/app.js"></script>
            <script type="text/javascript">var key = "secret";</script>
            <script src="https://cdn.example.net/lib.js"></script>
            </head></html>
        "#;
        let sources = extract_sources(html, &base());
        assert_eq!(sources.len(), 3);
        assert_eq!(
            sources[0],
            Source::External(Url::parse("https://example.com/static/app.js").unwrap())
        );
        assert!(matches!(&sources[1], Source::Inline(body) if body.contains("secret")));
        assert_eq!(
            sources[2],
            Source::External(Url::parse("https://cdn.example.net/lib.js").unwrap())
        );
    }

    #[test]
    fn picks_up_manifest_links_and_ignores_styles() {
        let html = r#"
            <link rel="stylesheet" href="/main.css">
            <a href="/package.json">deps</a>
            <a href="/about.html">about</a>
        "#;
        let sources = extract_sources(html, &base());
        assert_eq!(sources.len(), 1);
        assert_eq!(
            sources[0],
            Source::External(Url::parse("https://example.com/package.json").unwrap())
        );
    }

    #[test]
    fn deduplicates_repeated_references() {
        let html = r#"
            <script src="app.js"></script>
            <script src="app.js"></script>
        "#;
        let sources = extract_sources(html, &base());
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn skips_non_http_schemes() {
        let html = r#"<script src="data:text/javascript,alert(1)"></script>"#;
        assert!(extract_sources(html, &base()).is_empty());
    }

    #[test]
    fn manifest_names_are_preserved_verbatim() {
        let url = Url::parse("https://example.com/assets/package.json").unwrap();
        assert_eq!(asset_filename(&url), "package.json");
    }

    #[test]
    fn external_names_get_a_hash_prefix() {
        let a = Url::parse("https://example.com/a/app.js").unwrap();
        let b = Url::parse("https://example.com/b/app.js").unwrap();
        let name_a = asset_filename(&a);
        let name_b = asset_filename(&b);
        assert!(name_a.ends_with("_app.js"));
        assert_ne!(name_a, name_b);
    }

    #[test]
    fn sanitize_defaults_extension() {
        assert_eq!(sanitize_filename("/api/bundle"), "bundle.txt");
        assert_eq!(sanitize_filename("/gen/js"), "js.js");
        assert_eq!(sanitize_filename(""), "asset.txt");
    }

    #[test]
    fn security_relevance_by_extension_and_filename() {
        assert!(is_security_relevant("/static/app.js?v=3"));
        assert!(is_security_relevant("yarn.lock"));
        assert!(is_security_relevant("/conf/settings.yaml"));
        assert!(!is_security_relevant("/style/main.css"));
        assert!(!is_security_relevant("/index.html"));
    }
}
