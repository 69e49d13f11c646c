//! Resource Fetcher
//!
//! Retrieves bytes for every supported URL scheme and hands back one uniform
//! [`FetchedBlob`]. Nothing here touches persistent storage.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};

use super::blob::BlobResolver;
use super::data_url;
use super::types::{FetchError, FetchedBlob, Scheme, SourceRequest};

/// Fetches resources over http(s), from local files, and from data/blob URLs
#[derive(Clone)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    blob_resolver: Option<Arc<dyn BlobResolver>>,
}

impl ResourceFetcher {
    /// Create a fetcher that identifies itself with the given user agent
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            blob_resolver: None,
        }
    }

    /// Attach the host capability used for `blob:` URLs
    pub fn with_blob_resolver(mut self, resolver: Arc<dyn BlobResolver>) -> Self {
        self.blob_resolver = Some(resolver);
        self
    }

    /// Fetch the bytes behind a source request
    pub async fn fetch(&self, request: &SourceRequest) -> Result<FetchedBlob, FetchError> {
        let url = request.raw_url();
        tracing::debug!(url = %url, scheme = ?request.scheme(), "Fetching resource");

        let blob = match request.scheme() {
            Scheme::Http | Scheme::Https => self.fetch_http(url).await?,
            Scheme::File => fetch_file(url).await?,
            Scheme::Data => fetch_data(url, url)?,
            Scheme::Blob => self.fetch_blob(url).await?,
            Scheme::Other => {
                return Err(FetchError::UnsupportedScheme(scheme_of(url)));
            }
        };

        if blob.is_empty() {
            tracing::warn!(url = %url, "Fetched resource is empty");
            return Err(FetchError::EmptyContent);
        }

        tracing::info!(
            url = %url,
            size = blob.len(),
            content_type = ?blob.declared_content_type,
            "Fetched resource"
        );

        Ok(blob)
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchedBlob, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(format!("HTTP {} for {}", status, url)));
        }

        let declared_content_type = header_value(response.headers(), CONTENT_TYPE);
        let content_disposition = header_value(response.headers(), CONTENT_DISPOSITION);
        let declared_length = response.content_length();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(format!("failed to read body: {}", e)))?;

        Ok(FetchedBlob {
            bytes: bytes.to_vec(),
            declared_content_type,
            content_disposition,
            declared_length,
            source_url: url.to_string(),
        })
    }

    async fn fetch_blob(&self, url: &str) -> Result<FetchedBlob, FetchError> {
        let resolver = self
            .blob_resolver
            .as_ref()
            .ok_or_else(|| FetchError::UnsupportedScheme("blob".to_string()))?;

        let resolved = resolver.resolve(url).await.map_err(|detail| {
            FetchError::network(format!("blob resolution failed: {}", detail))
        })?;

        if Scheme::detect(&resolved) != Scheme::Data {
            return Err(FetchError::MalformedDataUrl(
                "blob resolver did not return a data URL".to_string(),
            ));
        }

        tracing::debug!(url = %url, "Resolved blob reference to data URL");
        fetch_data(&resolved, url)
    }
}

async fn fetch_file(url: &str) -> Result<FetchedBlob, FetchError> {
    let path = file_url_to_path(url)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(path.display().to_string())
        } else {
            FetchError::network(format!("failed to read {}: {}", path.display(), e))
        }
    })?;

    let declared_content_type = mime_guess::from_path(&path)
        .first()
        .map(|mime| mime.essence_str().to_string());

    Ok(FetchedBlob {
        declared_length: Some(bytes.len() as u64),
        bytes,
        declared_content_type,
        content_disposition: None,
        source_url: url.to_string(),
    })
}

fn fetch_data(data_url: &str, source_url: &str) -> Result<FetchedBlob, FetchError> {
    let parsed = data_url::parse(data_url)?;

    Ok(FetchedBlob {
        declared_length: None,
        declared_content_type: Some(parsed.media_type),
        content_disposition: parsed
            .name
            .map(|name| format!("attachment; filename=\"{}\"", name)),
        bytes: parsed.bytes,
        source_url: source_url.to_string(),
    })
}

fn file_url_to_path(url: &str) -> Result<PathBuf, FetchError> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.to_file_path().ok())
        .ok_or_else(|| FetchError::NotFound(url.to_string()))
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn scheme_of(url: &str) -> String {
    url.split_once(':')
        .map(|(scheme, _)| scheme.to_string())
        .unwrap_or_else(|| url.to_string())
}
