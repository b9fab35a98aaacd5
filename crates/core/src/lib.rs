//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request and response snapshots
//! - The store contract and its SQLite implementation
//! - The network contract
//! - Unified error types
//! - Configuration structures

pub mod address;
pub mod config;
pub mod error;
pub mod network;
pub mod request;
pub mod response;
pub mod store;

pub use config::{AppConfig, ConfigError, FallbackManifest, InstallPolicy, ManifestIcon, WorkerConfig};
pub use error::Error;
pub use network::Network;
pub use request::{Request, RequestMode};
pub use response::{Response, ResponseType};
pub use store::{GenerationHandle, Store, StoreDb, StoreHandle};
