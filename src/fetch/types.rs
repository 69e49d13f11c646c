//! Fetch types

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Source Request
// ============================================================================

/// URL scheme of a source request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
    Blob,
    Data,
    File,
    Other,
}

impl Scheme {
    /// Detect the scheme from the text before the first `:`
    pub fn detect(raw_url: &str) -> Self {
        let Some((scheme, _)) = raw_url.trim_start().split_once(':') else {
            return Self::Other;
        };

        match scheme.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "https" => Self::Https,
            "blob" => Self::Blob,
            "data" => Self::Data,
            "file" => Self::File,
            _ => Self::Other,
        }
    }
}

/// A single fetch invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    raw_url: String,
    scheme: Scheme,
}

impl SourceRequest {
    pub fn new(raw_url: impl Into<String>) -> Self {
        let raw_url = raw_url.into().trim().to_string();
        let scheme = Scheme::detect(&raw_url);
        Self { raw_url, scheme }
    }

    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}

// ============================================================================
// Fetched Blob
// ============================================================================

/// Bytes retrieved for a source plus whatever the source declared about them
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,

    /// MIME type declared by the source (Content-Type, data: mediatype, extension guess)
    pub declared_content_type: Option<String>,

    /// Raw Content-Disposition value, if any
    pub content_disposition: Option<String>,

    /// Length the source claimed (Content-Length or file size)
    pub declared_length: Option<u64>,

    /// URL the bytes were fetched for
    pub source_url: String,
}

impl FetchedBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Filename carried by the Content-Disposition value, if any
    pub fn disposition_filename(&self) -> Option<String> {
        let disposition = self.content_disposition.as_deref()?;

        disposition
            .split(';')
            .map(str::trim)
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("filename"))
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fetch errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {detail}")]
    Network { detail: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("Source returned no content")]
    EmptyContent,
}

impl FetchError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }
}
