//! PDF backend built on lopdf
//!
//! Pure-Rust parsing; no native libraries required. The parsed document is
//! kept in memory and text extraction is serialized behind a mutex, since
//! lopdf's extractor takes `&Document` but walks shared object tables.

use std::path::Path;

use lopdf::Document;
use parking_lot::Mutex;

use super::error::{OpenError, Result};
use super::traits::{DocumentBackend, PageTextSource};

/// Default PDF backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn open_path(&self, path: &Path) -> Result<Box<dyn PageTextSource>> {
        let document = Document::load(path).map_err(|e| OpenError::Unreadable(e.to_string()))?;
        Ok(Box::new(LopdfPages::new(document)?))
    }

    fn open_bytes(&self, bytes: Vec<u8>) -> Result<Box<dyn PageTextSource>> {
        let document =
            Document::load_mem(&bytes).map_err(|e| OpenError::Unreadable(e.to_string()))?;
        Ok(Box::new(LopdfPages::new(document)?))
    }
}

/// Page text access over a parsed lopdf document
struct LopdfPages {
    document: Mutex<Document>,
    /// 1-based lopdf page numbers in reading order
    page_numbers: Vec<u32>,
}

impl LopdfPages {
    fn new(mut document: Document) -> Result<Self> {
        // Unprotected documents may still carry an empty user password
        if document.is_encrypted() && document.decrypt("").is_err() {
            return Err(OpenError::Unreadable(
                "document is password protected".to_string(),
            ));
        }

        let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(OpenError::NoPages);
        }
        page_numbers.sort_unstable();

        Ok(Self {
            document: Mutex::new(document),
            page_numbers,
        })
    }
}

impl PageTextSource for LopdfPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Option<String> {
        let page_number = *self.page_numbers.get(index)?;
        let document = self.document.lock();

        match document.extract_text(&[page_number]) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(page = index, error = %e, "No extractable text on page");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Build a PDF with one line of Helvetica text per page
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 18.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_page_count_and_text() {
        let bytes = build_pdf(&["Cover page", "Quarterly revenue grew"]);
        let pages = LopdfBackend.open_bytes(bytes).unwrap();

        assert_eq!(pages.page_count(), 2);
        let text = pages.page_text(1).unwrap();
        assert!(text.contains("Quarterly"), "extracted: {:?}", text);
        assert_eq!(pages.page_text(2), None);
    }

    #[test]
    fn test_open_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("three.pdf");
        std::fs::write(&path, build_pdf(&["a", "b", "c"])).unwrap();

        let pages = LopdfBackend.open_path(&path).unwrap();
        assert_eq!(pages.page_count(), 3);
    }

    #[test]
    fn test_zero_pages_is_no_pages() {
        let bytes = build_pdf(&[]);
        let err = LopdfBackend.open_bytes(bytes.clone()).err().unwrap();
        assert_eq!(err, OpenError::NoPages);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(LopdfBackend.open_path(&path).err(), Some(OpenError::NoPages));
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = LopdfBackend
            .open_bytes(b"%PDF-1.4\nthis is not really a pdf".to_vec())
            .err()
            .unwrap();
        assert!(matches!(err, OpenError::Unreadable(_)));
    }
}
