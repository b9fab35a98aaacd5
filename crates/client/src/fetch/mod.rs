//! HTTP implementation of the network contract.
//!
//! ### Response classification
//! - Any status the server sends resolves `Ok`; only transport failures are errors
//! - Same-origin final URLs are `basic`, everything else `cors`
//! - `redirected` is set when the final URL differs from the requested one
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: configurable
//! - No timeout unless one is configured

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use url::Url;

use shellcache_core::{AppConfig, Error, Network, Request, Response, ResponseType};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 64MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Application origin, used to tell same-origin responses apart.
    pub origin: Url,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 64 * 1024 * 1024,
            timeout: None,
            max_redirects: 5,
            origin: Url::parse("http://localhost:8080/").expect("static origin parses"),
        }
    }
}

impl FetchConfig {
    /// Build from the loaded application config and its resolved origin.
    pub fn from_app(app: &AppConfig, origin: Url) -> Self {
        Self {
            user_agent: app.user_agent.clone(),
            max_bytes: app.max_bytes,
            timeout: app.timeout(),
            origin,
            ..Default::default()
        }
    }
}

/// Classify a response by where it finally came from.
pub fn response_type_for(origin: &Url, final_url: &Url) -> ResponseType {
    if final_url.origin() == origin.origin() { ResponseType::Basic } else { ResponseType::Cors }
}

/// HTTP client backing the engine's network contract.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn send(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let response = self
            .http
            .request(method, request.url.as_str())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url, e)))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response {
            url: Some(final_url.to_string()),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type: response_type_for(&self.config.origin, &final_url),
            redirected: final_url != request.url,
            headers,
            body: bytes,
        })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.send(request).await
    }
}
