//! Blob URL resolution
//!
//! `blob:` references only mean something inside the document context that
//! created them, so a plain network client cannot dereference them. The host
//! supplies a [`BlobResolver`] that turns the reference into a `data:` URL
//! (typically by running a FileReader in the webview).

use async_trait::async_trait;

/// Host capability that converts a `blob:` URL into a `data:` URL
#[async_trait]
pub trait BlobResolver: Send + Sync {
    /// Resolve the blob reference, returning a `data:` URL or a failure description
    async fn resolve(&self, blob_url: &str) -> Result<String, String>;
}

/// Resolver backed by a fixed table, for hosts that pre-register blobs
#[derive(Debug, Default, Clone)]
pub struct StaticBlobResolver {
    entries: std::collections::HashMap<String, String>,
}

impl StaticBlobResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `data:` URL a blob reference resolves to
    pub fn with_entry(mut self, blob_url: impl Into<String>, data_url: impl Into<String>) -> Self {
        self.entries.insert(blob_url.into(), data_url.into());
        self
    }
}

#[async_trait]
impl BlobResolver for StaticBlobResolver {
    async fn resolve(&self, blob_url: &str) -> Result<String, String> {
        self.entries
            .get(blob_url)
            .cloned()
            .ok_or_else(|| format!("blob is no longer available: {}", blob_url))
    }
}
