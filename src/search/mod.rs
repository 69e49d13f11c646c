//! Full-text search
//!
//! Case- and diacritic-insensitive substring search over document pages,
//! with cyclic navigation through the results.

mod engine;
mod normalize;
mod state;

pub use engine::{scan, scan_with_context, SearchEngine, SearchError, DEFAULT_EXCERPT_CONTEXT};
pub use normalize::{create_excerpt, excerpt_from_chars, normalize_for_search, FoldedText};
pub use state::{Direction, MatchLocation, SearchState};
