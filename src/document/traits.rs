//! Document traits
//!
//! Format-agnostic interfaces between the document model and a parsing backend.
//! Both traits are synchronous: callers run them on blocking threads.

use std::path::Path;

use super::error::Result;

/// Opens documents for page-level text access
pub trait DocumentBackend: Send + Sync {
    /// Short backend identifier for logs
    fn name(&self) -> &'static str;

    /// Open a document from a file on disk
    fn open_path(&self, path: &Path) -> Result<Box<dyn PageTextSource>>;

    /// Open a document from an in-memory copy of its bytes
    fn open_bytes(&self, bytes: Vec<u8>) -> Result<Box<dyn PageTextSource>>;
}

/// Read-only page text of an opened document
pub trait PageTextSource: Send + Sync {
    /// Number of pages
    fn page_count(&self) -> usize;

    /// Extracted text of a page (0-based)
    ///
    /// `None` when the index is out of range or the page has no text layer.
    fn page_text(&self, index: usize) -> Option<String>;
}

/// Pre-extracted text, one string per page
impl PageTextSource for Vec<String> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page_text(&self, index: usize) -> Option<String> {
        self.get(index).cloned()
    }
}
