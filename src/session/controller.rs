//! Session Controller
//!
//! Orchestrates fetch, classification, caching and model opening for one
//! document at a time, then serves search and navigation over it.
//!
//! # State Machine
//!
//! ```text
//! Idle → Fetching → Classifying → Caching → Ready ⇄ Searching
//!            └──────────┴────────────┴──→ Failed     └──→ Closed
//! ```
//!
//! Starting a new acquisition cancels and replaces the previous session.
//! Pipeline stages check the session token between stages and discard their
//! result if the session has been replaced or closed in the meantime.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::SessionError;
use super::types::{OpenSession, OpenedDocument, SearchSummary, SessionContext, SessionState};
use crate::cache::{CacheKey, CacheStore};
use crate::classify::{classify, ExtensionHint};
use crate::config::Config;
use crate::document::{DocumentBackend, DocumentModel, LopdfBackend, DEFAULT_TEXT_CACHE_PAGES};
use crate::fetch::{ResourceFetcher, SourceRequest};
use crate::search::{Direction, SearchEngine, DEFAULT_EXCERPT_CONTEXT};

/// Tunables for opened documents
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub text_cache_pages: usize,
    pub excerpt_context: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            text_cache_pages: DEFAULT_TEXT_CACHE_PAGES,
            excerpt_context: DEFAULT_EXCERPT_CONTEXT,
        }
    }
}

/// Single-session document controller
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    fetcher: ResourceFetcher,
    store: CacheStore,
    backend: Arc<dyn DocumentBackend>,
    options: SessionOptions,
    context: Mutex<SessionContext>,
}

impl SessionController {
    pub fn new(
        fetcher: ResourceFetcher,
        store: CacheStore,
        backend: Arc<dyn DocumentBackend>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                fetcher,
                store,
                backend,
                options,
                context: Mutex::new(SessionContext::idle()),
            }),
        }
    }

    /// Controller with the lopdf backend, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ResourceFetcher::new(&config.fetch.user_agent),
            CacheStore::new(&config.cache.dir, config.retention()),
            Arc::new(LopdfBackend::new()),
            SessionOptions {
                text_cache_pages: config.search.text_cache_pages,
                excerpt_context: config.search.excerpt_context,
            },
        )
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    // ========================================================================
    // Acquisition
    // ========================================================================

    /// Fetch, validate, cache and open the document at `url`
    ///
    /// Any session already active is closed first.
    pub async fn acquire_and_open(&self, url: &str) -> Result<OpenedDocument, SessionError> {
        let (session_id, token) = self.begin_session(url);
        tracing::info!(session = %session_id, url = %url, "Acquiring document");

        match self.run_pipeline(session_id, &token, url).await {
            Ok(open) => {
                let opened = open.opened.clone();
                let mut ctx = self.inner.context.lock();
                if ctx.id != session_id || token.is_cancelled() {
                    tracing::debug!(session = %session_id, "Discarding result of replaced session");
                    return Err(SessionError::Cancelled);
                }
                ctx.document = Some(open);
                ctx.state = SessionState::Ready;
                tracing::info!(
                    session = %session_id,
                    key = %opened.cache_key,
                    kind = ?opened.kind,
                    pages = ?opened.page_count,
                    "Document ready"
                );
                Ok(opened)
            }
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
            Err(e) => {
                let mut ctx = self.inner.context.lock();
                if ctx.id == session_id && !token.is_cancelled() {
                    ctx.state = SessionState::Failed;
                    ctx.failure = Some(e.clone());
                    ctx.token.cancel();
                }
                tracing::warn!(session = %session_id, url = %url, kind = e.kind(), error = %e, "Acquisition failed");
                Err(e)
            }
        }
    }

    fn begin_session(&self, url: &str) -> (Uuid, CancellationToken) {
        let mut ctx = self.inner.context.lock();
        if ctx.state != SessionState::Idle {
            tracing::debug!(session = %ctx.id, state = ?ctx.state, "Closing previous session");
            ctx.release();
        }
        *ctx = SessionContext::starting(url);
        (ctx.id, ctx.token.clone())
    }

    async fn run_pipeline(
        &self,
        session_id: Uuid,
        token: &CancellationToken,
        url: &str,
    ) -> Result<OpenSession, SessionError> {
        let request = SourceRequest::new(url);

        let blob = tokio::select! {
            _ = token.cancelled() => return Err(SessionError::Cancelled),
            fetched = self.inner.fetcher.fetch(&request) => fetched?,
        };
        self.enter(session_id, token, SessionState::Classifying)?;

        let hint = ExtensionHint::from_blob(&blob);
        let classification = classify(&blob, &hint);
        if !classification.is_accepted() {
            if let Some(diagnostic) = classification.diagnostic {
                return Err(SessionError::Rejected { diagnostic });
            }
        }
        if let Some(diagnostic) = classification.diagnostic {
            tracing::warn!(url = %url, diagnostic = %diagnostic, "Accepting document with advisory diagnostic");
        }
        self.enter(session_id, token, SessionState::Caching)?;

        let key = CacheKey::derive(
            &blob.source_url,
            hint.file_stem(),
            classification.kind,
            Utc::now(),
        );
        let entry = self.inner.store.put(&key, &blob.bytes).await?;
        drop(blob);
        self.check(session_id, token)?;

        let model = if classification.is_pdf() {
            let backend = self.inner.backend.clone();
            let pages = self.inner.options.text_cache_pages;
            let open_entry = entry.clone();
            let model = tokio::task::spawn_blocking(move || {
                DocumentModel::open_with_capacity(&open_entry, backend.as_ref(), pages)
            })
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))??;
            self.check(session_id, token)?;
            Some(model)
        } else {
            None
        };

        let search = SearchEngine::with_parent(token.clone(), self.inner.options.excerpt_context);

        Ok(OpenSession {
            opened: OpenedDocument {
                kind: classification.kind,
                cache_key: entry.key,
                page_count: model.as_ref().map(DocumentModel::page_count),
                size_bytes: entry.size_bytes,
                diagnostic: classification.diagnostic,
            },
            model,
            search,
        })
    }

    /// Move to the next pipeline stage unless the session was replaced
    fn enter(
        &self,
        session_id: Uuid,
        token: &CancellationToken,
        state: SessionState,
    ) -> Result<(), SessionError> {
        let mut ctx = self.inner.context.lock();
        if ctx.id != session_id || token.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        tracing::debug!(session = %session_id, from = ?ctx.state, to = ?state, "Session transition");
        ctx.state = state;
        Ok(())
    }

    fn check(&self, session_id: Uuid, token: &CancellationToken) -> Result<(), SessionError> {
        if token.is_cancelled() || self.inner.context.lock().id != session_id {
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Search the open document; lands on the first match
    pub async fn search(&self, query: &str) -> Result<SearchSummary, SessionError> {
        let (session_id, model, engine) = {
            let mut ctx = self.inner.context.lock();
            let (model, engine) = searchable(&ctx)?;
            ctx.state = SessionState::Searching;
            ctx.searches_in_flight += 1;
            (ctx.id, model, engine)
        };

        let result = engine.search(&model, query).await;

        {
            let mut ctx = self.inner.context.lock();
            if ctx.id == session_id && ctx.state == SessionState::Searching {
                ctx.searches_in_flight = ctx.searches_in_flight.saturating_sub(1);
                if ctx.searches_in_flight == 0 {
                    ctx.state = SessionState::Ready;
                }
            }
        }

        let state = result?;
        Ok(SearchSummary::from(&state))
    }

    /// Step to the next or previous match, wrapping around
    pub async fn navigate(&self, direction: Direction) -> Result<SearchSummary, SessionError> {
        let engine = {
            let ctx = self.inner.context.lock();
            searchable(&ctx)?.1
        };
        let state = engine.navigate(direction).await;
        Ok(SearchSummary::from(&state))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Close the active session; closing twice is a no-op
    pub fn close(&self) {
        let mut ctx = self.inner.context.lock();
        match ctx.state {
            SessionState::Idle | SessionState::Closed | SessionState::Failed => {}
            _ => {
                ctx.release();
                ctx.state = SessionState::Closed;
                tracing::info!(
                    session = %ctx.id,
                    open_for_ms = (Utc::now() - ctx.started_at).num_milliseconds(),
                    "Session closed"
                );
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.context.lock().state
    }

    /// Error that moved the session to `Failed`
    pub fn last_error(&self) -> Option<SessionError> {
        self.inner.context.lock().failure.clone()
    }

    pub fn current_document(&self) -> Option<OpenedDocument> {
        let ctx = self.inner.context.lock();
        ctx.document.as_ref().map(|d| d.opened.clone())
    }

    pub fn source_url(&self) -> Option<String> {
        self.inner.context.lock().source_url.clone()
    }
}

fn searchable(ctx: &SessionContext) -> Result<(DocumentModel, SearchEngine), SessionError> {
    if !ctx.state.is_open() {
        return Err(SessionError::NotReady);
    }
    let document = ctx.document.as_ref().ok_or(SessionError::NotReady)?;
    let model = document.model.clone().ok_or(SessionError::NotSearchable)?;
    Ok((model, document.search.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreError;
    use crate::classify::{Diagnostic, DocumentKind};
    use crate::document::{OpenError, PageTextSource};
    use crate::search::SearchError;
    use crate::fetch::FetchError;
    use base64::Engine as _;
    use std::path::Path;
    use tempfile::TempDir;

    /// Treats every cached file as UTF-8 text with pages split on form feeds
    struct TextBackend;

    impl DocumentBackend for TextBackend {
        fn name(&self) -> &'static str {
            "text"
        }

        fn open_path(&self, path: &Path) -> crate::document::Result<Box<dyn PageTextSource>> {
            let bytes = std::fs::read(path).map_err(|e| OpenError::Unreadable(e.to_string()))?;
            self.open_bytes(bytes)
        }

        fn open_bytes(&self, bytes: Vec<u8>) -> crate::document::Result<Box<dyn PageTextSource>> {
            let text = String::from_utf8_lossy(&bytes).to_string();
            let pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();
            Ok(Box::new(pages))
        }
    }

    /// [`TextBackend`] whose page extraction takes `delay` per page
    struct SlowTextBackend {
        delay: std::time::Duration,
    }

    struct SlowPages {
        pages: Vec<String>,
        delay: std::time::Duration,
    }

    impl PageTextSource for SlowPages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> Option<String> {
            std::thread::sleep(self.delay);
            self.pages.get(index).cloned()
        }
    }

    impl DocumentBackend for SlowTextBackend {
        fn name(&self) -> &'static str {
            "slow-text"
        }

        fn open_path(&self, path: &Path) -> crate::document::Result<Box<dyn PageTextSource>> {
            let bytes = std::fs::read(path).map_err(|e| OpenError::Unreadable(e.to_string()))?;
            self.open_bytes(bytes)
        }

        fn open_bytes(&self, bytes: Vec<u8>) -> crate::document::Result<Box<dyn PageTextSource>> {
            let text = String::from_utf8_lossy(&bytes).to_string();
            Ok(Box::new(SlowPages {
                pages: text.split('\u{c}').map(str::to_string).collect(),
                delay: self.delay,
            }))
        }
    }

    fn controller(dir: &TempDir) -> SessionController {
        controller_with(CacheStore::with_default_retention(dir.path()), Arc::new(TextBackend))
    }

    fn controller_with(store: CacheStore, backend: Arc<dyn DocumentBackend>) -> SessionController {
        SessionController::new(
            ResourceFetcher::new("pdfhandler-test"),
            store,
            backend,
            SessionOptions::default(),
        )
    }

    fn data_url(media_type: &str, body: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            media_type,
            base64::engine::general_purpose::STANDARD.encode(body)
        )
    }

    fn pdf_url(pages: &[&str]) -> String {
        data_url("application/pdf", format!("%PDF-1.4\n{}", pages.join("\u{c}")).as_bytes())
    }

    #[tokio::test]
    async fn test_acquire_search_navigate_close() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);
        assert_eq!(session.state(), SessionState::Idle);

        let opened = session
            .acquire_and_open(&pdf_url(&["intro", "the term", "term again"]))
            .await
            .unwrap();
        assert_eq!(opened.kind, DocumentKind::Pdf);
        assert_eq!(opened.page_count, Some(3));
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.store().get(&opened.cache_key).await.is_ok());

        let summary = session.search("TERM").await.unwrap();
        assert_eq!(summary.match_count, 2);
        assert_eq!(summary.current_index, 0);
        assert_eq!(summary.current.as_ref().map(|m| m.page_index), Some(1));
        assert_eq!(session.state(), SessionState::Ready);

        let back = session.navigate(Direction::Backward).await.unwrap();
        assert_eq!(back.current_index, 1);
        assert_eq!(back.current.map(|m| m.page_index), Some(2));

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.search("term").await, Err(SessionError::NotReady));
    }

    #[tokio::test]
    async fn test_masquerade_fails_session() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);

        let url = data_url("application/pdf", b"<!DOCTYPE html><html><body>Sign in</body></html>");
        let err = session.acquire_and_open(&url).await.unwrap_err();

        assert_eq!(
            err,
            SessionError::Rejected {
                diagnostic: Diagnostic::HtmlMasquerade
            }
        );
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_error(), Some(err));
        assert!(session.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_kind_is_preserved() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);

        let err = session.acquire_and_open("ftp://example.com/a.pdf").await.unwrap_err();
        assert!(matches!(err, SessionError::Fetch(FetchError::UnsupportedScheme(_))));
        assert_eq!(err.kind(), "unsupported_scheme");
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_opaque_binary_is_ready_but_not_searchable() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);

        let opened = session
            .acquire_and_open(&data_url("application/zip", b"PK\x03\x04 archive"))
            .await
            .unwrap();
        assert_eq!(opened.kind, DocumentKind::OpaqueBinary);
        assert_eq!(opened.page_count, None);
        assert_eq!(session.state(), SessionState::Ready);

        assert_eq!(session.search("x").await, Err(SessionError::NotSearchable));
        assert_eq!(
            session.navigate(Direction::Forward).await,
            Err(SessionError::NotSearchable)
        );
    }

    #[tokio::test]
    async fn test_search_before_open() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);
        assert_eq!(session.search("x").await, Err(SessionError::NotReady));
        assert_eq!(
            session.navigate(Direction::Forward).await,
            Err(SessionError::NotReady)
        );
        session.close();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_new_acquisition_replaces_previous() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir);

        session.acquire_and_open(&pdf_url(&["first doc"])).await.unwrap();
        session.search("first").await.unwrap();

        let second = session.acquire_and_open(&pdf_url(&["second doc", "more"])).await.unwrap();
        assert_eq!(second.page_count, Some(2));
        assert_eq!(session.current_document(), Some(second));

        let summary = session.search("first").await.unwrap();
        assert_eq!(summary.match_count, 0);
        assert_eq!(summary.current_index, -1);
    }

    #[tokio::test]
    async fn test_new_acquisition_cancels_running_search() {
        let dir = TempDir::new().unwrap();
        let session = controller_with(
            CacheStore::with_default_retention(dir.path()),
            Arc::new(SlowTextBackend {
                delay: std::time::Duration::from_millis(20),
            }),
        );

        let pages = vec!["needle in a haystack"; 100];
        session.acquire_and_open(&pdf_url(&pages)).await.unwrap();

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.search("needle").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert_eq!(session.state(), SessionState::Searching);

        let second = session.acquire_and_open(&pdf_url(&["second doc"])).await.unwrap();

        assert_eq!(
            running.await.unwrap(),
            Err(SessionError::Search(SearchError::Superseded))
        );
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.current_document(), Some(second));

        let summary = session.search("second").await.unwrap();
        assert_eq!(summary.match_count, 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_cache_write_failure_fails_session() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let session = controller_with(
            CacheStore::with_default_retention(&blocker),
            Arc::new(TextBackend),
        );
        let err = session.acquire_and_open(&pdf_url(&["body"])).await.unwrap_err();

        assert!(matches!(err, SessionError::Store(StoreError::WriteFailed { .. })));
        assert_eq!(err.kind(), "write_failed");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_error(), Some(err));
        assert_eq!(session.current_document(), None);
    }

    #[tokio::test]
    async fn test_close_during_fetch_cancels() {
        use axum::{routing::get, Router};

        let app = Router::new().route(
            "/slow.pdf",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                "%PDF-1.4 late"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = TempDir::new().unwrap();
        let session = controller(&dir);

        let pending = {
            let session = session.clone();
            let url = format!("http://{}/slow.pdf", addr);
            tokio::spawn(async move { session.acquire_and_open(&url).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(session.state(), SessionState::Fetching);

        session.close();
        assert_eq!(pending.await.unwrap(), Err(SessionError::Cancelled));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.store().list().await.is_empty());
    }
}
