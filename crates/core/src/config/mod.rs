//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (explicit path, or SHELLCACHE_CONFIG_FILE)
//! 3. Built-in defaults
//!
//! [`AppConfig`] is what gets loaded; [`WorkerConfig`] is the resolved,
//! immutable view handed to the engine at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;
mod worker;

pub use validation::ConfigError;
pub use worker::WorkerConfig;

/// What happens when a manifest asset cannot be fetched during install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPolicy {
    /// Any failure aborts the install; nothing is written.
    #[default]
    Strict,
    /// Failures are logged and skipped; the install still succeeds.
    Lenient,
}

/// One icon entry of the application manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Contents of the substitute application manifest served when neither the
/// store nor the network can supply the real one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackManifest {
    pub name: String,
    pub short_name: String,
    pub start_url: String,
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_theme_color")]
    pub theme_color: String,
    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

fn default_display() -> String {
    "standalone".into()
}

fn default_background_color() -> String {
    "#ffffff".into()
}

fn default_theme_color() -> String {
    "#111827".into()
}

impl Default for FallbackManifest {
    fn default() -> Self {
        Self {
            name: "Frame Extractor".into(),
            short_name: "Frames".into(),
            start_url: ".".into(),
            display: default_display(),
            background_color: default_background_color(),
            theme_color: default_theme_color(),
            icons: vec![ManifestIcon { src: "icon.svg".into(), sizes: "any".into(), mime_type: "image/svg+xml".into() }],
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL the application is served from. Relative asset paths resolve against it.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Active generation identifier. Bump it whenever the asset set changes.
    ///
    /// Set via SHELLCACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Asset manifest: URLs pre-loaded into the active generation on install.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    /// URL substrings that are never read from or written to the store.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Failure policy for install.
    ///
    /// Set via SHELLCACHE_INSTALL_POLICY environment variable (`strict` or `lenient`).
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// Path of the application manifest document, relative to the origin.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Substitute manifest served when the real one is unreachable.
    #[serde(default)]
    pub fallback_manifest: FallbackManifest,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional network timeout in milliseconds. Unset means requests may wait indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Maximum bytes accepted per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_generation() -> String {
    "frame-extractor-v1".into()
}

fn default_assets() -> Vec<String> {
    [
        ".",
        "index.html",
        "manifest.json",
        "ffmpeg-assets/index.js",
        "ffmpeg-assets/ffmpeg-core.js",
        "ffmpeg-assets/ffmpeg-core.wasm",
        "ffmpeg-assets/worker.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclusions() -> Vec<String> {
    vec!["cdn.tailwindcss.com".into()]
}

fn default_manifest_path() -> String {
    "manifest.json".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024 // the wasm core is ~30MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            generation: default_generation(),
            assets: default_assets(),
            exclusions: default_exclusions(),
            install_policy: InstallPolicy::Strict,
            manifest_path: default_manifest_path(),
            fallback_manifest: FallbackManifest::default(),
            user_agent: default_user_agent(),
            timeout_ms: None,
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// The TOML file comes from `SHELLCACHE_CONFIG_FILE` when set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("SHELLCACHE_CONFIG_FILE").map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load configuration with an explicit TOML file layered under the environment.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
