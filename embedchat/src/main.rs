//! Embedchat - an embeddable website chat widget service.
//!
//! A single HTTP process serves the chat API (rate-limited, session
//! tracked, backed by the Gemini API or canned fallback phrases) and
//! the client-side widget assets that host pages embed via /embed.js.

mod cli;
mod config;
mod error;
mod gemini;
mod limiter;
mod models;
mod server;
mod store;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("embedchat=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
