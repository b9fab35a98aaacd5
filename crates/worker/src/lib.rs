//! Offline cache engine.
//!
//! Intercepts an application's requests and answers them from a versioned,
//! generation-scoped store or the network:
//!
//! - [`router`] classifies each request (bypass or one of three strategies)
//! - [`strategy`] fulfils intercepted requests
//! - [`population`] fills a generation at install time
//! - [`generation`] owns install, activate and stale-generation cleanup
//! - [`lifecycle`] dispatches host events to all of the above

pub mod fallback;
pub mod generation;
pub mod lifecycle;
pub mod population;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use fallback::{MANIFEST_CONTENT_TYPE, synthetic_manifest};
pub use generation::{ActivateReport, FailedDeletion, GenerationManager, GenerationState};
pub use lifecycle::{EventReply, FetchReply, HostSignal, LifecycleEvent, ServiceWorker, Signaled};
pub use population::{InstallReport, SkippedAsset, populate};
pub use router::{BypassReason, Route, Strategy, classify};
pub use strategy::{Fulfilled, ResponseSource};
