use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::worker::CacheManifest;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// Full URL of the backend `/ask` endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/ask".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Base URL that asset paths are resolved against on a cache miss.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            prefix: default_prefix(),
            version: default_version(),
            origin: default_origin(),
            assets: default_assets(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/medassist-cache.sqlite")
}
fn default_prefix() -> String {
    "medassist".to_string()
}
fn default_version() -> String {
    "v1".to_string()
}
fn default_origin() -> String {
    "http://127.0.0.1:3000".to_string()
}
fn default_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/public/icon-192.png",
        "/public/icon-512.png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl CacheConfig {
    pub fn manifest(&self) -> CacheManifest {
        CacheManifest {
            prefix: self.prefix.clone(),
            version: self.version.clone(),
            assets: self.assets.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Loads and validates the configuration at `path`.
///
/// A missing file is not an error: the built-in defaults describe the stock
/// local setup (backend on port 8000, `medassist-v1` bucket).
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Parses `raw` as an absolute http(s) URL with a host.
pub fn parse_http_url(raw: &str) -> Result<reqwest::Url> {
    let url =
        reqwest::Url::parse(raw).with_context(|| format!("'{}' is not a valid URL", raw))?;
    match url.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("'{}' must use http or https, not '{}'", raw, other),
    }
    if url.host_str().map_or(true, str::is_empty) {
        anyhow::bail!("'{}' has no host", raw);
    }
    Ok(url)
}

pub fn validate(config: &Config) -> Result<()> {
    parse_http_url(&config.assistant.endpoint)
        .context("assistant.endpoint must be an http(s) URL")?;
    parse_http_url(&config.cache.origin).context("cache.origin must be an http(s) URL")?;

    if config.cache.prefix.trim().is_empty() {
        anyhow::bail!("cache.prefix must not be empty");
    }
    if config.cache.version.trim().is_empty() {
        anyhow::bail!("cache.version must not be empty");
    }

    if config.cache.assets.is_empty() {
        anyhow::bail!("cache.assets must list at least one asset");
    }
    if let Some(bad) = config.cache.assets.iter().find(|a| !a.starts_with('/')) {
        anyhow::bail!("cache.assets entries must start with '/': '{}'", bad);
    }

    Ok(())
}
