//! Session error types
//!
//! Wraps every component error unchanged so callers see the originating kind.

use thiserror::Error;

use crate::cache::StoreError;
use crate::classify::Diagnostic;
use crate::document::OpenError;
use crate::fetch::FetchError;
use crate::search::SearchError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Classification refused the content
    #[error("Content rejected: {diagnostic}")]
    Rejected { diagnostic: Diagnostic },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Search(#[from] SearchError),

    /// A newer session or a close interrupted this one
    #[error("Session was cancelled")]
    Cancelled,

    #[error("No document is open")]
    NotReady,

    /// The open document has no text to search (not a PDF)
    #[error("Document is not searchable")]
    NotSearchable,

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// Stable snake_case identifier
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => match e {
                FetchError::Network { .. } => "network",
                FetchError::NotFound(_) => "not_found",
                FetchError::UnsupportedScheme(_) => "unsupported_scheme",
                FetchError::MalformedDataUrl(_) => "malformed_data_url",
                FetchError::EmptyContent => "empty_content",
            },
            Self::Rejected { diagnostic } => diagnostic.as_str(),
            Self::Store(e) => match e {
                StoreError::NotFound(_) => "cache_miss",
                StoreError::EmptyAfterWrite(_) => "empty_after_write",
                StoreError::WriteFailed { .. } => "write_failed",
                StoreError::VerifyFailed { .. } => "verify_failed",
                StoreError::InvalidKey(_) => "invalid_key",
            },
            Self::Open(e) => match e {
                OpenError::NoPages => "no_pages",
                OpenError::Unreadable(_) => "unreadable",
            },
            Self::Search(e) => match e {
                SearchError::Superseded => "superseded",
                SearchError::TaskFailed(_) => "search_failed",
            },
            Self::Cancelled => "cancelled",
            Self::NotReady => "not_ready",
            Self::NotSearchable => "not_searchable",
            Self::TaskFailed(_) => "task_failed",
        }
    }

    /// Classification diagnostic behind a rejection
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            Self::Rejected { diagnostic } => Some(*diagnostic),
            _ => None,
        }
    }

    /// Text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(FetchError::Network { detail }) => {
                format!("The document could not be downloaded: {}", detail)
            }
            Self::Fetch(FetchError::NotFound(what)) => {
                format!("The document was not found: {}", what)
            }
            Self::Fetch(FetchError::UnsupportedScheme(scheme)) => {
                format!("Links of type \"{}\" cannot be opened.", scheme)
            }
            Self::Fetch(FetchError::MalformedDataUrl(_)) => {
                "The embedded document link is malformed.".to_string()
            }
            Self::Fetch(FetchError::EmptyContent) => "The downloaded file is empty.".to_string(),
            Self::Rejected { diagnostic } => diagnostic.user_message().to_string(),
            Self::Store(_) => "The document could not be saved locally.".to_string(),
            Self::Open(OpenError::NoPages) => "The PDF has no pages.".to_string(),
            Self::Open(OpenError::Unreadable(_)) => "The PDF could not be opened.".to_string(),
            Self::Search(_) | Self::Cancelled => "The operation was cancelled.".to_string(),
            Self::NotReady => "No document is open.".to_string(),
            Self::NotSearchable => "This document cannot be searched.".to_string(),
            Self::TaskFailed(_) => "An internal error occurred.".to_string(),
        }
    }
}
