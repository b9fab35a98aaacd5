//! Named, generation-scoped response store.
//!
//! The engine only talks to storage through [`Store`] and [`StoreHandle`].
//! [`StoreDb`] is the SQLite-backed implementation:
//!
//! - One row per generation name, entries cascade on delete
//! - Entries keyed by SHA-256 of the request identity (method + URL)
//! - Atomic batch population in a single transaction
//! - An install marker separate from the row's existence
//! - WAL mode for concurrent access

pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;

use async_trait::async_trait;

use crate::{Error, Request, Response};

pub use connection::StoreDb;
pub use generations::GenerationHandle;

/// The collection of named stores.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Handle: StoreHandle;

    /// Open the store named `name`, creating it if absent.
    async fn open(&self, name: &str) -> Result<Self::Handle, Error>;

    /// Names of every store that currently exists.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Whether the named store exists and its population was marked complete.
    async fn is_installed(&self, name: &str) -> Result<bool, Error>;

    /// Delete the named store and all of its entries.
    ///
    /// Returns false when no store had that name.
    async fn delete(&self, name: &str) -> Result<bool, Error>;
}

/// One opened store.
#[async_trait]
pub trait StoreHandle: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Look up the entry for the request identity.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Insert or overwrite one entry.
    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error>;

    /// Write every entry or none of them.
    async fn put_all(&self, entries: &[(Request, Response)]) -> Result<(), Error>;

    /// Record that population of this store completed.
    async fn mark_installed(&self) -> Result<(), Error>;

    /// URLs of every stored entry, sorted.
    async fn entry_urls(&self) -> Result<Vec<String>, Error>;
}
