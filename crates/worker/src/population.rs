//! Install-time population of the active generation.
//!
//! Every manifest asset is fetched concurrently. Under the strict policy the
//! results are written as one atomic batch, or not at all. Under the lenient
//! policy each asset stands alone; failures are reported and skipped, except
//! the application manifest, which falls back to the synthetic document.

use futures_util::future::join_all;
use serde::Serialize;
use url::Url;

use shellcache_core::{Error, InstallPolicy, Network, Request, Response, StoreHandle, WorkerConfig};

use crate::fallback::synthetic_manifest;

/// An asset the lenient policy left out of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    pub url: String,
    pub reason: String,
}

/// Outcome of populating a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub policy: InstallPolicy,
    /// Assets written from network responses, in manifest order.
    pub cached: Vec<String>,
    /// Assets written from a synthetic substitute.
    pub synthesized: Vec<String>,
    pub skipped: Vec<SkippedAsset>,
}

impl InstallReport {
    fn new(generation: &str, policy: InstallPolicy) -> Self {
        Self { generation: generation.to_string(), policy, cached: Vec::new(), synthesized: Vec::new(), skipped: Vec::new() }
    }
}

/// Populate `store` with every asset in the manifest.
///
/// # Errors
///
/// Strict policy: `Error::AssetUnavailable` for the first asset (in manifest
/// order) that failed, or the store error if the batch write fails. Nothing is
/// written in either case. Lenient policy never fails.
pub async fn populate<H, N>(store: &H, network: &N, config: &WorkerConfig) -> Result<InstallReport, Error>
where
    H: StoreHandle,
    N: Network + ?Sized,
{
    let fetched = join_all(config.assets.iter().map(|asset| fetch_asset(network, asset))).await;
    let results: Vec<(Request, Result<Response, Error>)> =
        config.assets.iter().map(|asset| Request::get(asset.clone())).zip(fetched).collect();

    match config.install_policy {
        InstallPolicy::Strict => populate_strict(store, config, results).await,
        InstallPolicy::Lenient => Ok(populate_lenient(store, config, results).await),
    }
}

async fn fetch_asset<N: Network + ?Sized>(network: &N, asset: &Url) -> Result<Response, Error> {
    let response = network
        .fetch(&Request::get(asset.clone()))
        .await
        .map_err(|e| Error::AssetUnavailable { url: asset.to_string(), reason: e.to_string() })?;

    if !response.ok() {
        return Err(Error::AssetUnavailable { url: asset.to_string(), reason: format!("status {}", response.status) });
    }

    Ok(response)
}

async fn populate_strict<H: StoreHandle>(
    store: &H, config: &WorkerConfig, results: Vec<(Request, Result<Response, Error>)>,
) -> Result<InstallReport, Error> {
    let mut report = InstallReport::new(store.name(), InstallPolicy::Strict);
    let mut batch = Vec::with_capacity(results.len());

    for (request, result) in results {
        match result {
            Ok(response) => batch.push((request, response)),
            Err(err) => {
                tracing::error!(generation = store.name(), error = %err, "failed to cache initial assets");
                return Err(err);
            }
        }
    }

    store.put_all(&batch).await?;
    report.cached = batch.into_iter().map(|(request, _)| request.url.to_string()).collect();

    tracing::info!(generation = %config.generation, assets = report.cached.len(), "all assets cached");
    Ok(report)
}

async fn populate_lenient<H: StoreHandle>(
    store: &H, config: &WorkerConfig, results: Vec<(Request, Result<Response, Error>)>,
) -> InstallReport {
    let mut report = InstallReport::new(store.name(), InstallPolicy::Lenient);

    for (request, result) in results {
        let url = request.url.to_string();
        let fetch_error = match result {
            Ok(response) => match store.put(&request, &response).await {
                Ok(()) => {
                    report.cached.push(url);
                    continue;
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        if config.is_manifest(&request.url) {
            let substitute = synthetic_manifest(&config.fallback_manifest);
            match store.put(&request, &substitute).await {
                Ok(()) => {
                    tracing::warn!(url = %url, error = %fetch_error, "manifest unavailable, stored synthetic fallback");
                    report.synthesized.push(url);
                    continue;
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "failed to store synthetic manifest"),
            }
        }

        tracing::warn!(url = %url, error = %fetch_error, "skipping asset");
        report.skipped.push(SkippedAsset { url, reason: fetch_error.to_string() });
    }

    tracing::info!(
        generation = %config.generation,
        cached = report.cached.len(),
        synthesized = report.synthesized.len(),
        skipped = report.skipped.len(),
        "lenient install finished"
    );
    report
}
