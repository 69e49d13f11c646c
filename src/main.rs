//! PDF Handler CLI
//!
//! Acquires one document and optionally searches it:
//!
//! ```text
//! pdfhandler <url> [query]
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{bail, Context};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdfhandler_core::session::{OpenedDocument, SearchSummary};
use pdfhandler_core::{Config, SessionController};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    url: String,
    document: OpenedDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<SearchSummary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdfhandler_core=debug,pdfhandler=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        bail!("usage: pdfhandler <url> [query]");
    };
    let query = args.next();

    tracing::info!("Starting pdfhandler v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Cache directory: {}", config.cache.dir.display());

    let controller = SessionController::from_config(&config);

    let document = match controller.acquire_and_open(&url).await {
        Ok(document) => document,
        Err(e) => bail!("{} ({})", e.user_message(), e.kind()),
    };

    let search = match query {
        Some(query) => Some(
            controller
                .search(&query)
                .await
                .with_context(|| format!("search for {:?} failed", query))?,
        ),
        None => None,
    };

    let output = Output {
        url,
        document,
        search,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to encode output")?
    );

    controller.close();
    Ok(())
}
