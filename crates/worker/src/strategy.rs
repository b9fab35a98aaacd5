//! Fulfillment strategies.
//!
//! Each strategy answers one intercepted request using the active generation
//! and the network. Store writes are always best-effort: a failed write is
//! logged and never changes what the caller receives.

use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use shellcache_core::{Error, FallbackManifest, Network, Request, Response, StoreHandle, WorkerConfig};

use crate::fallback::synthetic_manifest;
use crate::router::Strategy;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Store,
    Synthetic,
}

/// A response ready to hand back to the platform.
///
/// When a cache miss was populated opportunistically, the store write runs in
/// the background; the response does not wait for it.
#[derive(Debug)]
pub struct Fulfilled {
    pub response: Response,
    pub source: ResponseSource,
    background: Option<JoinHandle<()>>,
}

impl Fulfilled {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, background: None }
    }

    fn with_background(mut self, handle: JoinHandle<()>) -> Self {
        self.background = Some(handle);
        self
    }

    /// Whether a background store write was started for this response.
    pub fn has_pending_write(&self) -> bool {
        self.background.is_some()
    }

    /// Wait for the background store write, if any. Hosts that keep the task
    /// alive until writes land (or tests) call this; serving never needs to.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.background.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "background store write task aborted");
        }
    }
}

/// Run the strategy chosen by the router.
pub async fn fulfill<H, N>(
    strategy: Strategy, store: &H, network: &N, request: &Request, config: &WorkerConfig,
) -> Result<Fulfilled, Error>
where
    H: StoreHandle,
    N: Network + ?Sized,
{
    match strategy {
        Strategy::NetworkFirst => network_first(store, network, request).await,
        Strategy::CacheFirst => cache_first(store, network, request).await,
        Strategy::Manifest => {
            manifest_first(store, network, request, &config.manifest_url, &config.fallback_manifest).await
        }
    }
}

/// Network first, store on network failure. Network responses are returned
/// verbatim and never written back.
pub async fn network_first<H, N>(store: &H, network: &N, request: &Request) -> Result<Fulfilled, Error>
where
    H: StoreHandle,
    N: Network + ?Sized,
{
    match network.fetch(request).await {
        Ok(response) => Ok(Fulfilled::new(response, ResponseSource::Network)),
        Err(err) => {
            tracing::debug!(url = %request.url, error = %err, "navigation fetch failed, falling back to store");
            match lookup(store, request).await {
                Some(cached) => Ok(Fulfilled::new(cached, ResponseSource::Store)),
                None => {
                    tracing::warn!(url = %request.url, "navigation failed and no stored copy exists");
                    Err(err)
                }
            }
        }
    }
}

/// Store first. On a miss, fetch and populate the store in the background if
/// the response is cacheable. Network failure on a miss propagates.
pub async fn cache_first<H, N>(store: &H, network: &N, request: &Request) -> Result<Fulfilled, Error>
where
    H: StoreHandle,
    N: Network + ?Sized,
{
    if let Some(cached) = lookup(store, request).await {
        tracing::debug!(url = %request.url, "store hit");
        return Ok(Fulfilled::new(cached, ResponseSource::Store));
    }

    let response = match network.fetch(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(url = %request.url, error = %err, "fetch failed");
            return Err(err);
        }
    };

    if !response.is_cacheable() {
        tracing::debug!(
            url = %request.url,
            status = response.status,
            response_type = %response.response_type,
            redirected = response.redirected,
            "response not cacheable, passing through"
        );
        return Ok(Fulfilled::new(response, ResponseSource::Network));
    }

    let write = spawn_put(store, request.clone(), response.clone());
    Ok(Fulfilled::new(response, ResponseSource::Network).with_background(write))
}

/// The application manifest: store, then network, then the synthetic document.
///
/// Lookups and writes use the manifest's fixed identity, so a versioned
/// `manifest.json?v=2` request shares the one entry.
pub async fn manifest_first<H, N>(
    store: &H, network: &N, request: &Request, manifest_url: &Url, fallback: &FallbackManifest,
) -> Result<Fulfilled, Error>
where
    H: StoreHandle,
    N: Network + ?Sized,
{
    let identity = Request::get(manifest_url.clone());

    if let Some(cached) = lookup(store, &identity).await {
        tracing::debug!(url = %request.url, "manifest store hit");
        return Ok(Fulfilled::new(cached, ResponseSource::Store));
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                let write = spawn_put(store, identity, response.clone());
                Ok(Fulfilled::new(response, ResponseSource::Network).with_background(write))
            } else {
                Ok(Fulfilled::new(response, ResponseSource::Network))
            }
        }
        Err(err) => {
            tracing::warn!(url = %request.url, error = %err, "manifest unreachable, serving synthetic fallback");
            Ok(Fulfilled::new(synthetic_manifest(fallback), ResponseSource::Synthetic))
        }
    }
}

/// Fulfil a request when the active generation could not be opened: the
/// store counts as empty, so only the network (and the synthetic manifest)
/// remain.
pub async fn fulfill_without_store<N>(
    strategy: Strategy, network: &N, request: &Request, config: &WorkerConfig,
) -> Result<Fulfilled, Error>
where
    N: Network + ?Sized,
{
    match network.fetch(request).await {
        Ok(response) => Ok(Fulfilled::new(response, ResponseSource::Network)),
        Err(err) if strategy == Strategy::Manifest => {
            tracing::warn!(url = %request.url, error = %err, "manifest unreachable, serving synthetic fallback");
            Ok(Fulfilled::new(synthetic_manifest(&config.fallback_manifest), ResponseSource::Synthetic))
        }
        Err(err) => Err(err),
    }
}

/// Store lookup where a read failure counts as a miss.
async fn lookup<H: StoreHandle>(store: &H, request: &Request) -> Option<Response> {
    match store.match_request(request).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(generation = store.name(), url = %request.url, error = %e, "store read failed, treating as miss");
            None
        }
    }
}

fn spawn_put<H: StoreHandle>(store: &H, request: Request, response: Response) -> JoinHandle<()> {
    let store = store.clone();
    tokio::spawn(async move {
        match store.put(&request, &response).await {
            Ok(()) => tracing::debug!(generation = store.name(), url = %request.url, "stored response"),
            Err(e) => {
                tracing::warn!(generation = store.name(), url = %request.url, error = %e, "store write failed")
            }
        }
    })
}
