//! Session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::SessionError;
use crate::cache::CacheKey;
use crate::classify::{Diagnostic, DocumentKind};
use crate::document::DocumentModel;
use crate::search::{MatchLocation, SearchEngine, SearchState};

/// Lifecycle of one document session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Fetching,
    Classifying,
    Caching,
    Ready,
    Searching,
    Closed,
    Failed,
}

impl SessionState {
    /// Pipeline still running
    pub fn is_acquiring(&self) -> bool {
        matches!(self, Self::Fetching | Self::Classifying | Self::Caching)
    }

    /// A document is open and may be searched
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Ready | Self::Searching)
    }
}

/// What a successful acquisition produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedDocument {
    pub kind: DocumentKind,
    pub cache_key: CacheKey,
    /// Present for PDFs only
    pub page_count: Option<usize>,
    pub size_bytes: u64,
    /// Advisory diagnostic on accepted content (a short PDF, say)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// Condensed search state for callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub match_count: usize,
    pub current_index: i64,
    pub current: Option<MatchLocation>,
}

impl From<&SearchState> for SearchSummary {
    fn from(state: &SearchState) -> Self {
        Self {
            match_count: state.match_count(),
            current_index: state.current_index,
            current: state.current().cloned(),
        }
    }
}

/// Everything that belongs to the active session
pub(crate) struct SessionContext {
    pub id: Uuid,
    pub source_url: Option<String>,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    /// Cancels the pipeline and every search of this session
    pub token: CancellationToken,
    pub document: Option<OpenSession>,
    pub failure: Option<SessionError>,
    pub searches_in_flight: usize,
}

/// Resources held while a document is open
pub(crate) struct OpenSession {
    pub opened: OpenedDocument,
    pub model: Option<DocumentModel>,
    pub search: SearchEngine,
}

impl SessionContext {
    pub fn idle() -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: None,
            state: SessionState::Idle,
            started_at: Utc::now(),
            token: CancellationToken::new(),
            document: None,
            failure: None,
            searches_in_flight: 0,
        }
    }

    pub fn starting(source_url: &str) -> Self {
        Self {
            source_url: Some(source_url.to_string()),
            state: SessionState::Fetching,
            ..Self::idle()
        }
    }

    /// Cancel outstanding work and drop the document
    pub fn release(&mut self) {
        self.token.cancel();
        if let Some(document) = self.document.take() {
            document.search.cancel();
        }
        self.searches_in_flight = 0;
    }
}
