//! Document model
//!
//! Read-only, page-addressable view of one cached document. Extracted page
//! text is memoized in a bounded LRU so repeated searches do not re-parse.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::error::{OpenError, Result};
use super::traits::{DocumentBackend, PageTextSource};
use crate::cache::CacheEntry;

/// Default number of pages whose text is kept in memory
pub const DEFAULT_TEXT_CACHE_PAGES: usize = 256;

/// An opened document; cheap to clone and safe to share across threads
#[derive(Clone)]
pub struct DocumentModel {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    source: Box<dyn PageTextSource>,
    page_count: usize,
    path: Option<PathBuf>,
    text_cache: Mutex<LruCache<usize, Option<Arc<str>>>>,
}

impl DocumentModel {
    /// Open a cached entry with the default text cache size
    ///
    /// Blocking: run on a blocking thread.
    pub fn open(entry: &CacheEntry, backend: &dyn DocumentBackend) -> Result<Self> {
        Self::open_with_capacity(entry, backend, DEFAULT_TEXT_CACHE_PAGES)
    }

    /// Open a cached entry, trying its path first and its bytes second
    pub fn open_with_capacity(
        entry: &CacheEntry,
        backend: &dyn DocumentBackend,
        text_cache_pages: usize,
    ) -> Result<Self> {
        let source = match backend.open_path(&entry.path) {
            Ok(source) => source,
            Err(OpenError::NoPages) => return Err(OpenError::NoPages),
            Err(path_err) => {
                tracing::warn!(
                    key = %entry.key,
                    backend = backend.name(),
                    error = %path_err,
                    "Open by path failed, retrying from bytes"
                );

                let bytes = std::fs::read(&entry.path)
                    .map_err(|e| OpenError::Unreadable(format!("{}; read: {}", path_err, e)))?;

                backend.open_bytes(bytes).map_err(|bytes_err| match bytes_err {
                    OpenError::NoPages => OpenError::NoPages,
                    other => OpenError::Unreadable(format!("{}; {}", path_err, other)),
                })?
            }
        };

        let model = Self::build(source, Some(entry.path.clone()), text_cache_pages)?;

        tracing::info!(
            key = %entry.key,
            backend = backend.name(),
            pages = model.page_count(),
            "Opened document"
        );

        Ok(model)
    }

    /// Wrap an already opened page source
    pub fn from_source(source: Box<dyn PageTextSource>) -> Result<Self> {
        Self::build(source, None, DEFAULT_TEXT_CACHE_PAGES)
    }

    fn build(
        source: Box<dyn PageTextSource>,
        path: Option<PathBuf>,
        text_cache_pages: usize,
    ) -> Result<Self> {
        let page_count = source.page_count();
        if page_count == 0 {
            return Err(OpenError::NoPages);
        }

        let capacity = NonZeroUsize::new(text_cache_pages.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            inner: Arc::new(ModelInner {
                source,
                page_count,
                path,
                text_cache: Mutex::new(LruCache::new(capacity)),
            }),
        })
    }

    pub fn page_count(&self) -> usize {
        self.inner.page_count
    }

    /// Backing file, when opened from the cache
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Text of a page (0-based); `None` for pages without text
    pub fn page_text(&self, index: usize) -> Option<Arc<str>> {
        if index >= self.inner.page_count {
            return None;
        }

        if let Some(cached) = self.inner.text_cache.lock().get(&index) {
            return cached.clone();
        }

        // Extract outside the lock; a racing extraction of the same page is harmless
        let text: Option<Arc<str>> = self
            .inner
            .source
            .page_text(index)
            .filter(|t| !t.trim().is_empty())
            .map(Arc::from);

        self.inner.text_cache.lock().put(index, text.clone());
        text
    }
}

impl std::fmt::Debug for DocumentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentModel")
            .field("page_count", &self.inner.page_count)
            .field("path", &self.inner.path)
            .finish()
    }
}
