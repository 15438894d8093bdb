//! paperfeed CLI: harvest research papers into a local record store.
//!
//! Crawls a day's arXiv listing, migrates OpenReview venues, and looks up
//! single abstracts across the supported sources.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
