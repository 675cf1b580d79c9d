//! Parcelforge - Florida cadastral parcel ingestion pipeline.
//!
//! A tool for ingesting county parcel data, enriching it with spatial
//! metrics and risk scores, and publishing it with zero-downtime swaps.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parcelforge::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "parcelforge=info"
    } else {
        "parcelforge=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
