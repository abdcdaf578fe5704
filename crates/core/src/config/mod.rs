//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HAVN_*)
//! 2. TOML config file (if HAVN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HAVN_*)
/// 2. TOML config file (if HAVN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via HAVN_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Version tag suffixed onto generation names (`static-<version>`).
    ///
    /// Set via HAVN_VERSION, usually to a build identifier.
    #[serde(default = "default_version")]
    pub version: String,

    /// Base URL that relative request URIs and manifest entries resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources pre-populated into the static generation on install.
    ///
    /// Set via HAVN_MANIFEST (an array such as `["/", "/app.js"]`) or a TOML list.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Path prefix served network-first.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// URL schemes belonging to the host's extension namespace; never intercepted.
    #[serde(default = "default_extension_schemes")]
    pub extension_schemes: Vec<String>,

    /// Hosts that are never proxied (third-party font hosting).
    #[serde(default = "default_bypass_domains")]
    pub bypass_domains: Vec<String>,

    /// Route whose cached copy is served when a cache-first request is offline.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// This is the transport's own limit; strategies never override it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./havn-cache.sqlite")
}

fn default_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_extension_schemes() -> Vec<String> {
    vec!["chrome-extension".into()]
}

fn default_bypass_domains() -> Vec<String> {
    vec!["fonts.googleapis.com".into(), "fonts.gstatic.com".into()]
}

fn default_fallback_document() -> String {
    "/".into()
}

fn default_user_agent() -> String {
    "havn/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            version: default_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            api_prefix: default_api_prefix(),
            extension_schemes: default_extension_schemes(),
            bypass_domains: default_bypass_domains(),
            fallback_document: default_fallback_document(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HAVN_`
    /// 2. TOML file from `HAVN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HAVN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HAVN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
