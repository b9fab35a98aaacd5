//! Intercepted request model.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::store::hash::compute_cache_key;

/// How the platform issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// A top-level page load.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// A request the application issued, as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub mode: RequestMode,
}

impl Request {
    /// A subresource GET.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, mode: RequestMode::NoCors }
    }

    /// A top-level navigation GET.
    pub fn navigate(url: Url) -> Self {
        Self { method: "GET".into(), url, mode: RequestMode::Navigate }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Request identity used as the store key: method plus URL.
    ///
    /// The mode does not take part, so a navigation and a subresource fetch of
    /// the same URL share one entry.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method.to_ascii_uppercase(), self.url.as_str())
    }
}
