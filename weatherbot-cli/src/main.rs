//! Binary crate for the `weatherbot` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - The Telegram command layer and delivery transport

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bot;
mod cli;
mod telegram;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
