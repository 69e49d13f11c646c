//! Resource Fetching
//!
//! Turns a URL of any supported scheme into raw bytes plus source metadata:
//! - `http`/`https`: network GET via reqwest
//! - `file`: local read
//! - `data`: in-process RFC 2397 decoding
//! - `blob`: resolved to a `data:` URL by a host [`BlobResolver`], then decoded
//!
//! Every successful fetch returns non-empty bytes.

pub mod blob;
pub mod data_url;
pub mod fetcher;
pub mod types;

pub use blob::{BlobResolver, StaticBlobResolver};
pub use data_url::DataUrl;
pub use fetcher::ResourceFetcher;
pub use types::*;
