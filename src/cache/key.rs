//! Cache key derivation
//!
//! Keys double as file names: `{stem}-{digest}-{millis}.{ext}`
//!
//! - `stem`: sanitised original base name (or `document`)
//! - `digest`: first 12 hex chars of SHA-256 over the source URL
//! - `millis`: creation time, so a new download never collides with a not yet
//!   evicted copy of a different resource under the same name
//! - `ext`: derived from the document kind

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::StoreError;
use crate::classify::DocumentKind;

const MAX_STEM_CHARS: usize = 48;
const DIGEST_CHARS: usize = 12;
const MAX_KEY_LEN: usize = 255;
const DEFAULT_STEM: &str = "document";

/// Identifier of a cache entry; also its file name inside the cache directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a fresh key for a document fetched from `source_url`
    pub fn derive(
        source_url: &str,
        base_name: Option<&str>,
        kind: DocumentKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        let stem = base_name
            .map(sanitize_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STEM.to_string());

        Self(format!(
            "{}-{}-{}.{}",
            stem,
            source_digest(source_url),
            created_at.timestamp_millis(),
            kind.extension()
        ))
    }

    /// Validate an externally supplied key
    ///
    /// Rejects anything that could name a path outside the cache directory.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let invalid = raw.is_empty()
            || raw.len() > MAX_KEY_LEN
            || raw.starts_with('.')
            || raw.contains("..")
            || raw.contains('/')
            || raw.contains('\\')
            || raw.chars().any(|c| c.is_control());

        if invalid {
            return Err(StoreError::InvalidKey(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation time encoded in the key, if the key follows the derived layout
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let (_, millis, _) = self.parts()?;
        let millis: i64 = millis.parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// URL digest encoded in the key
    pub fn source_digest(&self) -> Option<&str> {
        self.parts().map(|(digest, _, _)| digest)
    }

    /// Document kind encoded in the key's extension
    pub fn kind(&self) -> Option<DocumentKind> {
        let (_, ext) = self.0.rsplit_once('.')?;
        DocumentKind::from_extension(ext)
    }

    /// Split into (digest, millis, ext)
    fn parts(&self) -> Option<(&str, &str, &str)> {
        let (body, ext) = self.0.rsplit_once('.')?;
        let mut pieces = body.rsplitn(3, '-');
        let millis = pieces.next()?;
        let digest = pieces.next()?;
        let _stem = pieces.next()?;

        if digest.len() != DIGEST_CHARS || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some((digest, millis, ext))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short stable digest of a source URL
pub fn source_digest(source_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_CHARS);
    digest
}

fn sanitize_stem(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            ' ' | '.' => Some('_'),
            _ => None,
        })
        .take(MAX_STEM_CHARS)
        .collect::<String>()
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}
