//! Resolved, immutable engine configuration.

use url::Url;

use super::validation::ConfigError;
use super::{AppConfig, FallbackManifest, InstallPolicy};
use crate::address::{parse_origin, resolve, same_document};

/// Everything the engine needs, resolved once at startup.
///
/// Built from [`AppConfig`]; never mutated afterwards. Share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub generation: String,
    /// Asset manifest in declaration order, resolved against `origin`.
    pub assets: Vec<Url>,
    pub exclusions: Vec<String>,
    pub install_policy: InstallPolicy,
    pub manifest_url: Url,
    pub fallback_manifest: FallbackManifest,
}

impl WorkerConfig {
    /// Whether the URL matches any exclusion pattern.
    pub fn is_excluded(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.exclusions.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    /// Whether the URL names the application manifest document.
    pub fn is_manifest(&self, url: &Url) -> bool {
        same_document(url, &self.manifest_url)
    }
}

impl AppConfig {
    /// Resolve this configuration into the engine's [`WorkerConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if validation fails, an asset or the
    /// manifest path cannot be resolved against the origin, or an asset matches
    /// an exclusion pattern.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        self.validate()?;

        let origin = parse_origin(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;

        let assets = self
            .assets
            .iter()
            .map(|asset| {
                resolve(&origin, asset)
                    .map_err(|e| ConfigError::Invalid { field: "assets".into(), reason: format!("{asset}: {e}") })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let excluded = assets.iter().find(|url| self.exclusions.iter().any(|p| url.as_str().contains(p.as_str())));
        if let Some(excluded) = excluded {
            return Err(ConfigError::Invalid {
                field: "assets".into(),
                reason: format!("{excluded} matches an exclusion pattern and can never be stored"),
            });
        }

        let manifest_url = resolve(&origin, &self.manifest_path)
            .map_err(|e| ConfigError::Invalid { field: "manifest_path".into(), reason: e.to_string() })?;

        Ok(WorkerConfig {
            origin,
            generation: self.generation.clone(),
            assets,
            exclusions: self.exclusions.clone(),
            install_policy: self.install_policy,
            manifest_url,
            fallback_manifest: self.fallback_manifest.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> WorkerConfig {
        AppConfig::default().worker_config().unwrap()
    }

    #[test]
    fn test_assets_resolve_in_order() {
        let config = worker();
        assert_eq!(config.assets[0].as_str(), "http://localhost:8080/");
        assert_eq!(config.assets[1].as_str(), "http://localhost:8080/index.html");
        assert_eq!(config.assets.len(), AppConfig::default().assets.len());
    }

    #[test]
    fn test_manifest_url_resolves() {
        assert_eq!(worker().manifest_url.as_str(), "http://localhost:8080/manifest.json");
    }

    #[test]
    fn test_is_manifest_ignores_query() {
        let config = worker();
        assert!(config.is_manifest(&Url::parse("http://localhost:8080/manifest.json?v=3").unwrap()));
        assert!(!config.is_manifest(&Url::parse("http://localhost:8080/other/manifest.json").unwrap()));
        assert!(!config.is_manifest(&Url::parse("https://elsewhere.test/manifest.json").unwrap()));
    }

    #[test]
    fn test_is_excluded_substring_match() {
        let config = worker();
        assert!(config.is_excluded(&Url::parse("https://cdn.tailwindcss.com/?plugins=forms").unwrap()));
        assert!(!config.is_excluded(&Url::parse("http://localhost:8080/index.html").unwrap()));
    }

    #[test]
    fn test_worker_config_rejects_unresolvable_asset() {
        let config = AppConfig { assets: vec!["ftp://files.example.com/core.wasm".into()], ..Default::default() };
        let result = config.worker_config();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "assets"));
    }

    #[test]
    fn test_worker_config_rejects_excluded_asset() {
        let config = AppConfig {
            assets: vec!["/".into(), "/api/status".into()],
            exclusions: vec!["/api/".into()],
            ..Default::default()
        };
        let result = config.worker_config();
        assert!(
            matches!(result, Err(ConfigError::Invalid { ref field, ref reason }) if field == "assets" && reason.contains("/api/status"))
        );
    }

    #[test]
    fn test_worker_config_runs_validation() {
        let config = AppConfig { generation: String::new(), ..Default::default() };
        assert!(config.worker_config().is_err());
    }
}
