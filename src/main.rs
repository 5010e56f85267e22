//! fillpdf MCP Server - Entry point
//!
//! Serves the form-filling tools over stdio. Configuration is read from
//! `FILLPDF_RESOURCE_DIRS`, `FILLPDF_PDFTK` and `FILLPDF_METADATA_STRIPPER`.

use fillpdf::{run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fillpdf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting fillpdf MCP server");

    run_server_with_config(ServerConfig::from_env()).await
}
