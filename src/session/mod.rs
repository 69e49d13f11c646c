//! Document sessions
//!
//! One active document per controller: acquire it, search it, close it.

mod controller;
mod error;
mod types;

pub use controller::{SessionController, SessionOptions};
pub use error::SessionError;
pub use types::{OpenedDocument, SearchSummary, SessionState};
