//! Search Engine
//!
//! Full-document substring search over a [`DocumentModel`].
//!
//! Scans run on a blocking thread and check their cancellation token before
//! every page. Each new query cancels the scan in flight and bumps a
//! generation counter; a result whose generation is no longer current is
//! dropped instead of replacing the visible state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::normalize::{excerpt_from_chars, normalize_for_search, FoldedText};
use super::state::{Direction, MatchLocation, SearchState};
use crate::document::DocumentModel;

/// Default number of chars shown on either side of a match
pub const DEFAULT_EXCERPT_CONTEXT: usize = 40;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// A newer query or a close arrived before this scan finished
    #[error("Search superseded by a newer request")]
    Superseded,

    #[error("Search task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Scanning
// ============================================================================

/// Scan every page for `query`
///
/// Returns `None` if `cancel` fires before the scan completes.
pub fn scan(
    model: &DocumentModel,
    query: &str,
    cancel: &CancellationToken,
) -> Option<Vec<MatchLocation>> {
    scan_with_context(model, query, DEFAULT_EXCERPT_CONTEXT, cancel)
}

/// [`scan`] with an explicit excerpt width
pub fn scan_with_context(
    model: &DocumentModel,
    query: &str,
    excerpt_context: usize,
    cancel: &CancellationToken,
) -> Option<Vec<MatchLocation>> {
    let needle = normalize_for_search(query.trim());
    let mut matches = Vec::new();
    if needle.is_empty() {
        return Some(matches);
    }

    for page_index in 0..model.page_count() {
        if cancel.is_cancelled() {
            tracing::debug!(query = %query, page = page_index, "Search scan cancelled");
            return None;
        }

        let Some(text) = model.page_text(page_index) else {
            continue;
        };

        let folded = FoldedText::new(&text);
        let hits = folded.find_all(&needle);
        if hits.is_empty() {
            continue;
        }

        let chars: Vec<char> = text.chars().collect();
        for (range_start, range_length) in hits {
            matches.push(MatchLocation {
                page_index,
                range_start,
                range_length,
                excerpt: excerpt_from_chars(&chars, range_start, range_length, excerpt_context),
            });
        }
    }

    Some(matches)
}

// ============================================================================
// Engine
// ============================================================================

/// Owns the search state of one open document
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    state: RwLock<SearchState>,
    generation: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
    /// Cancelling this cancels every scan started by the engine
    parent: CancellationToken,
    excerpt_context: usize,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::with_parent(CancellationToken::new(), DEFAULT_EXCERPT_CONTEXT)
    }

    /// Engine whose scans are children of `parent`
    pub fn with_parent(parent: CancellationToken, excerpt_context: usize) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: RwLock::new(SearchState::empty()),
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                parent,
                excerpt_context,
            }),
        }
    }

    /// Run a query, replacing the current state on success
    pub async fn search(
        &self,
        model: &DocumentModel,
        query: &str,
    ) -> Result<SearchState, SearchError> {
        let (generation, token) = self.begin();

        let scan_model = model.clone();
        let scan_query = query.to_string();
        let scan_token = token.clone();
        let context = self.inner.excerpt_context;

        let scanned = tokio::task::spawn_blocking(move || {
            scan_with_context(&scan_model, &scan_query, context, &scan_token)
        })
        .await
        .map_err(|e| SearchError::TaskFailed(e.to_string()))?;

        let Some(matches) = scanned else {
            return Err(SearchError::Superseded);
        };

        let mut state = self.inner.state.write().await;
        if token.is_cancelled() || self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(query = %query, generation, "Discarding stale search result");
            return Err(SearchError::Superseded);
        }

        *state = SearchState::from_matches(query.trim(), matches);
        tracing::info!(
            query = %state.query,
            matches = state.match_count(),
            "Search complete"
        );

        Ok(state.clone())
    }

    /// Move through the current matches
    pub async fn navigate(&self, direction: Direction) -> SearchState {
        let mut state = self.inner.state.write().await;
        state.advance(direction);
        state.clone()
    }

    pub async fn state(&self) -> SearchState {
        self.inner.state.read().await.clone()
    }

    /// Cancel any scan in flight without touching the current state
    pub fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.inner.in_flight.lock().take() {
            token.cancel();
        }
    }

    /// Cancel any scan in flight and forget the current matches
    pub async fn clear(&self) {
        self.cancel();
        *self.inner.state.write().await = SearchState::empty();
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = self.inner.parent.child_token();
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(previous) = in_flight.replace(token.clone()) {
            previous.cancel();
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, token)
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}
