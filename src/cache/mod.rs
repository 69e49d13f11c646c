//! Document Cache
//!
//! Accepted documents are persisted under a single directory, one file per
//! entry, named by their [`CacheKey`]. Entries older than the retention window
//! are swept before every write.

mod key;
mod store;

pub use key::{source_digest, CacheKey};
pub use store::{CacheEntry, CacheStore, StoreError, DEFAULT_RETENTION_DAYS};
