//! Lifecycle event handling.
//!
//! The host delivers install, activate, and fetch events to a
//! [`ServiceWorker`]. Install and activate are awaited units that end with a
//! signal for the host; fetch either declines (the platform handles the
//! request) or answers with a response.

use std::sync::Arc;

use shellcache_core::{Error, Network, Request, Store, WorkerConfig};

use crate::generation::{ActivateReport, GenerationManager, GenerationState};
use crate::population::InstallReport;
use crate::router::{BypassReason, Route, classify};
use crate::strategy::{Fulfilled, fulfill, fulfill_without_store};

/// An event delivered by the host.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch(Request),
}

/// What the host should do once a lifecycle event completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostSignal {
    /// Promote the new instance without waiting for old clients to close.
    SkipWaiting,
    /// Take control of every open client.
    ClaimClients,
}

/// A lifecycle report paired with the signal for the host.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Signaled<R> {
    pub report: R,
    pub signal: HostSignal,
}

/// Answer to a fetch event.
#[derive(Debug)]
pub enum FetchReply {
    /// Not intercepted; the platform performs the request itself.
    Decline(BypassReason),
    Respond(Fulfilled),
}

#[derive(Debug)]
pub enum EventReply {
    Installed(Signaled<InstallReport>),
    Activated(Signaled<ActivateReport>),
    Fetched(FetchReply),
}

pub struct ServiceWorker<S, N: ?Sized> {
    manager: GenerationManager<S, N>,
}

impl<S, N> ServiceWorker<S, N>
where
    S: Store,
    N: Network + ?Sized,
{
    pub fn new(store: Arc<S>, network: Arc<N>, config: Arc<WorkerConfig>) -> Self {
        Self { manager: GenerationManager::new(store, network, config) }
    }

    pub fn manager(&self) -> &GenerationManager<S, N> {
        &self.manager
    }

    pub fn config(&self) -> &WorkerConfig {
        self.manager.config()
    }

    /// Deliver one event.
    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<EventReply, Error> {
        match event {
            LifecycleEvent::Install => self.on_install().await.map(EventReply::Installed),
            LifecycleEvent::Activate => self.on_activate().await.map(EventReply::Activated),
            LifecycleEvent::Fetch(request) => self.on_fetch(&request).await.map(EventReply::Fetched),
        }
    }

    /// Populate the generation, then ask the host to skip waiting.
    ///
    /// # Errors
    ///
    /// Fails when population fails; the host must not promote the instance.
    pub async fn on_install(&self) -> Result<Signaled<InstallReport>, Error> {
        match self.manager.install().await {
            Ok(report) => {
                tracing::info!(
                    generation = %report.generation,
                    cached = report.cached.len(),
                    "install complete"
                );
                Ok(Signaled { report, signal: HostSignal::SkipWaiting })
            }
            Err(e) => {
                tracing::error!(generation = %self.config().generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    /// Purge stale generations, then ask the host to claim clients.
    pub async fn on_activate(&self) -> Result<Signaled<ActivateReport>, Error> {
        let report = self.manager.activate().await?;
        tracing::info!(
            generation = %report.generation,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activated"
        );
        Ok(Signaled { report, signal: HostSignal::ClaimClients })
    }

    /// Route and, if intercepted, fulfil one request.
    ///
    /// Only an active instance answers requests; before install completes
    /// every request is declined without opening the store.
    ///
    /// # Errors
    ///
    /// Returns the network failure when neither the network nor the store
    /// could answer an intercepted request.
    pub async fn on_fetch(&self, request: &Request) -> Result<FetchReply, Error> {
        match self.manager.state().await {
            GenerationState::Active => {}
            GenerationState::Installing => return Ok(FetchReply::Decline(BypassReason::NotActive)),
            GenerationState::Superseded => return Ok(FetchReply::Decline(BypassReason::Superseded)),
        }

        let config = self.config();
        let strategy = match classify(config, request) {
            Route::Bypass(reason) => {
                tracing::debug!(url = %request.url, method = %request.method, ?reason, "bypassing");
                return Ok(FetchReply::Decline(reason));
            }
            Route::Intercept(strategy) => strategy,
        };

        let network = self.manager.network();
        let fulfilled = match self.manager.handle().await {
            Ok(handle) => fulfill(strategy, &handle, network, request, config).await,
            Err(e) => {
                tracing::warn!(generation = %config.generation, error = %e, "store unavailable, serving from network");
                fulfill_without_store(strategy, network, request, config).await
            }
        };

        fulfilled.map(FetchReply::Respond)
    }
}
