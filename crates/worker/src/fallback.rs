//! Synthetic application manifest.

use shellcache_core::{FallbackManifest, Response};

pub const MANIFEST_CONTENT_TYPE: &str = "application/manifest+json";

/// Build a fresh substitute manifest response: status 200, JSON body.
pub fn synthetic_manifest(manifest: &FallbackManifest) -> Response {
    // FallbackManifest is plain strings, serialization cannot fail
    let body = serde_json::to_vec(manifest).unwrap_or_else(|_| b"{}".to_vec());
    Response::new(200, body)
        .with_status_text("OK")
        .with_header("Content-Type", MANIFEST_CONTENT_TYPE)
}
