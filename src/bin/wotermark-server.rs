use anyhow::Context;
use clap::Parser;

use wotermark::server::{self, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads env fallbacks
    let dotenv = dotenvy::dotenv();

    let config = ServerConfig::parse();
    server::init_tracing(config.log_format);

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => tracing::warn!(".env file not found"),
        Err(e) => tracing::warn!(error = %e, "failed to load .env file"),
    }

    server::serve(config).await.context("server error")
}
