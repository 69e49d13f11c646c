//! Shared fixtures for end-to-end tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;

use pdfhandler_core::cache::CacheStore;
use pdfhandler_core::document::LopdfBackend;
use pdfhandler_core::fetch::{BlobResolver, ResourceFetcher};
use pdfhandler_core::session::{SessionController, SessionOptions};

/// Build a PDF with one line of Helvetica text per page.
/// Writes the body first, then an xref with exact byte offsets.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + i * 2))
        .collect();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            pages.len()
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        let page_obj = 4 + i * 2;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj,
                page_obj + 1
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                page_obj + 1,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// In-process HTTP server on an ephemeral port
///
/// Routes:
/// - `/report.pdf`: a three-page PDF mentioning "quarterly" on pages 2 and 3
/// - `/login.pdf`: an HTML sign-in page served with a `.pdf` URL
/// - `/missing.pdf`: 404
pub async fn spawn_server() -> SocketAddr {
    let report = pdf_with_pages(&[
        "Annual overview",
        "The quarterly figures improved",
        "Quarterly outlook remains stable",
    ]);

    let app = Router::new()
        .route(
            "/report.pdf",
            get(move || {
                let body = report.clone();
                async move { ([(header::CONTENT_TYPE, "application/pdf")], body).into_response() }
            }),
        )
        .route(
            "/login.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<!DOCTYPE html>\n<html><head><title>Sign in</title></head><body><form></form></body></html>",
                )
                    .into_response()
            }),
        )
        .route(
            "/missing.pdf",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "no such file").into_response() }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Controller over the real lopdf backend, caching into `dir`
pub fn controller(dir: &TempDir) -> SessionController {
    controller_with_fetcher(dir, ResourceFetcher::new("pdfhandler-test"))
}

pub fn controller_with_blobs(dir: &TempDir, resolver: Arc<dyn BlobResolver>) -> SessionController {
    controller_with_fetcher(
        dir,
        ResourceFetcher::new("pdfhandler-test").with_blob_resolver(resolver),
    )
}

fn controller_with_fetcher(dir: &TempDir, fetcher: ResourceFetcher) -> SessionController {
    SessionController::new(
        fetcher,
        CacheStore::with_default_retention(dir.path()),
        Arc::new(LopdfBackend::new()),
        SessionOptions::default(),
    )
}
