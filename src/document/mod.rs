//! Document Model
//!
//! Page-addressable text access over a cached document.
//!
//! # Architecture
//!
//! ```text
//! DocumentModel (LRU text memo, shared via Arc)
//!       │
//!       ▼
//! PageTextSource ◄── DocumentBackend::open_path / open_bytes
//!       │
//!       ├── LopdfBackend (default)
//!       └── Vec<String> (pre-extracted text)
//! ```

mod error;
mod model;
mod pdf;
mod traits;

pub use error::{OpenError, Result};
pub use model::{DocumentModel, DEFAULT_TEXT_CACHE_PAGES};
pub use pdf::LopdfBackend;
pub use traits::{DocumentBackend, PageTextSource};
