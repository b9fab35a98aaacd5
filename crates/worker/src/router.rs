//! Request classification.
//!
//! Decides, without any I/O, whether a request is left to the platform or
//! which fulfillment strategy handles it. Rules apply in priority order:
//!
//! 1. Non-GET methods are bypassed
//! 2. URLs matching an exclusion pattern are bypassed
//! 3. The application manifest gets its own strategy
//! 4. Navigations go network-first
//! 5. Everything else goes cache-first

use serde::Serialize;
use shellcache_core::{Request, WorkerConfig};

/// Why a request was left to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    NonGet,
    Excluded,
    /// The generation has not finished installing.
    NotActive,
    /// The instance no longer controls clients.
    Superseded,
}

/// How an intercepted request is fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    Manifest,
}

/// Routing decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Bypass(BypassReason),
    Intercept(Strategy),
}

/// Classify a request.
pub fn classify(config: &WorkerConfig, request: &Request) -> Route {
    if !request.is_get() {
        return Route::Bypass(BypassReason::NonGet);
    }

    if config.is_excluded(&request.url) {
        return Route::Bypass(BypassReason::Excluded);
    }

    if config.is_manifest(&request.url) {
        return Route::Intercept(Strategy::Manifest);
    }

    if request.is_navigation() {
        return Route::Intercept(Strategy::NetworkFirst);
    }

    Route::Intercept(Strategy::CacheFirst)
}
