//! Document error types

use thiserror::Error;

/// Failure to turn a cached file into a searchable document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    /// The document parsed but contains zero pages
    #[error("Document has no pages")]
    NoPages,

    /// Neither the file path nor its bytes could be parsed
    #[error("Document is unreadable: {0}")]
    Unreadable(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, OpenError>;
