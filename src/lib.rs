//! PDF Handler Core
//!
//! Acquires documents from http(s), file, data and blob URLs, validates that
//! the bytes are what they claim to be, caches them on disk with a retention
//! window, and serves full-text search over the cached copy.
//!
//! # Modules
//!
//! - `fetch`: URL scheme dispatch and byte retrieval
//! - `classify`: content sniffing and diagnostics
//! - `cache`: atomic, TTL-evicting filesystem cache
//! - `document`: page text access via pluggable backends (lopdf by default)
//! - `search`: normalized substring search and cyclic navigation
//! - `session`: the acquisition pipeline and per-document lifecycle
//! - `bridge`: request/reply front end for hosts

pub mod bridge;
pub mod cache;
pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod search;
pub mod session;

pub use config::Config;
pub use session::{SessionController, SessionError, SessionState};
