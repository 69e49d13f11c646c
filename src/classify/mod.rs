//! Content Classification
//!
//! Decides what a fetched byte stream actually is, independent of what the
//! URL or server claims. Precedence:
//!
//! 1. Empty input is always `{opaqueBinary, empty}`
//! 2. The `%PDF` signature means `pdf`, whatever the hint says
//! 3. With a pdf hint but no signature, markup in the first bytes means the
//!    server sent a web page (`htmlMasquerade`), a cut-off signature or short
//!    body means `truncated`, anything else is `unknownFormat`
//! 4. Everything else is accepted as opaque binary
//!
//! Pure functions only; nothing here touches storage.

mod types;

pub use types::{ClassificationResult, Diagnostic, DocumentKind, ExtensionHint};

use crate::fetch::FetchedBlob;

/// Leading bytes of every PDF file
pub const PDF_SIGNATURE: &[u8] = b"%PDF";

/// How many leading bytes are inspected for markup
const SNIFF_WINDOW: usize = 20;

/// Markup openings that betray an HTML/XML response
const MARKUP_TELLTALES: &[&[u8]] = &[b"<?xml", b"<html", b"<!doctype html"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Classify fetched content against what its source claimed
pub fn classify(blob: &FetchedBlob, hint: &ExtensionHint) -> ClassificationResult {
    let bytes = blob.bytes.as_slice();

    if bytes.is_empty() {
        return ClassificationResult::new(DocumentKind::OpaqueBinary, Some(Diagnostic::Empty));
    }

    let short_body = blob
        .declared_length
        .map_or(false, |declared| declared > bytes.len() as u64);

    if bytes.starts_with(PDF_SIGNATURE) {
        let diagnostic = short_body.then_some(Diagnostic::Truncated);
        return ClassificationResult::new(DocumentKind::Pdf, diagnostic);
    }

    if !hint.expects_pdf() {
        return ClassificationResult::new(DocumentKind::OpaqueBinary, None);
    }

    let diagnostic = if looks_like_markup(bytes) {
        Diagnostic::HtmlMasquerade
    } else if PDF_SIGNATURE.starts_with(bytes) || short_body {
        Diagnostic::Truncated
    } else {
        Diagnostic::UnknownFormat
    };

    tracing::debug!(
        url = %blob.source_url,
        diagnostic = %diagnostic,
        head = %String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_WINDOW)]),
        "Content does not match pdf hint"
    );

    ClassificationResult::new(DocumentKind::OpaqueBinary, Some(diagnostic))
}

/// Whether the first bytes (after a BOM and whitespace) open an HTML/XML document
fn looks_like_markup(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());

    let window: Vec<u8> = bytes[start..]
        .iter()
        .take(SNIFF_WINDOW)
        .map(u8::to_ascii_lowercase)
        .collect();

    MARKUP_TELLTALES
        .iter()
        .any(|tell| window.windows(tell.len()).any(|w| w == *tell))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(bytes: &[u8]) -> FetchedBlob {
        FetchedBlob {
            bytes: bytes.to_vec(),
            declared_content_type: None,
            content_disposition: None,
            declared_length: None,
            source_url: "https://example.com/doc.pdf".to_string(),
        }
    }

    fn pdf_hint() -> ExtensionHint {
        ExtensionHint::from_extension("pdf")
    }

    #[test]
    fn test_signature_wins_over_any_hint() {
        for hint in [
            pdf_hint(),
            ExtensionHint::from_extension("docx"),
            ExtensionHint::from_extension("html"),
            ExtensionHint::none(),
        ] {
            let result = classify(&blob(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"), &hint);
            assert_eq!(result.kind, DocumentKind::Pdf);
            assert_eq!(result.diagnostic, None);
        }
    }

    #[test]
    fn test_empty_is_always_empty() {
        for hint in [pdf_hint(), ExtensionHint::none()] {
            let result = classify(&blob(b""), &hint);
            assert_eq!(
                result,
                ClassificationResult::new(DocumentKind::OpaqueBinary, Some(Diagnostic::Empty))
            );
        }
    }

    #[test]
    fn test_html_login_page_with_pdf_hint() {
        let page = b"<!DOCTYPE html>\n<html><head><title>Sign in</title></head></html>";
        let result = classify(&blob(page), &pdf_hint());
        assert_eq!(result.kind, DocumentKind::OpaqueBinary);
        assert_eq!(result.diagnostic, Some(Diagnostic::HtmlMasquerade));
    }

    #[test]
    fn test_xml_error_with_bom_and_whitespace() {
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(b"\r\n  <?xml version=\"1.0\"?><Error><Code>AccessDenied</Code></Error>");
        let result = classify(&blob(&body), &pdf_hint());
        assert_eq!(result.diagnostic, Some(Diagnostic::HtmlMasquerade));
    }

    #[test]
    fn test_markup_beyond_window_is_unknown() {
        let body = b"garbage garbage garbage garbage <html>";
        let result = classify(&blob(body), &pdf_hint());
        assert_eq!(result.diagnostic, Some(Diagnostic::UnknownFormat));
    }

    #[test]
    fn test_cut_off_signature_is_truncated() {
        let result = classify(&blob(b"%PD"), &pdf_hint());
        assert_eq!(result.kind, DocumentKind::OpaqueBinary);
        assert_eq!(result.diagnostic, Some(Diagnostic::Truncated));
    }

    #[test]
    fn test_short_body_against_declared_length() {
        let mut short = blob(b"%PDF-1.4 partial");
        short.declared_length = Some(4096);
        let result = classify(&short, &pdf_hint());
        assert_eq!(result.kind, DocumentKind::Pdf);
        assert_eq!(result.diagnostic, Some(Diagnostic::Truncated));
        assert!(result.is_accepted());
    }

    #[test]
    fn test_non_pdf_hint_is_opaque_binary() {
        let body = b"PK\x03\x04 zip content";
        let result = classify(&blob(body), &ExtensionHint::from_extension("docx"));
        assert_eq!(result, ClassificationResult::new(DocumentKind::OpaqueBinary, None));

        let html = classify(&blob(b"<html></html>"), &ExtensionHint::none());
        assert_eq!(html.diagnostic, None);
    }
}
