//! clipdesk CLI — resumable news-clipping curation pipeline.
//!
//! Inspects checkpointed curation runs, lists configured workflow
//! instances, and trims assembled reports down to the curated selection.

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
