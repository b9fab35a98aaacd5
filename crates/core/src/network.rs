//! The network contract consumed by the engine.

use async_trait::async_trait;

use crate::{Error, Request, Response};

/// Issues requests to the network.
///
/// Any response the server produced (including 404 or 500) resolves `Ok`;
/// `Err` means the request itself failed, the way a rejected fetch does.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
