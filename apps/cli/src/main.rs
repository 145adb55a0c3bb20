//! sheetdrop CLI: one-shot spreadsheet ingestion.
//!
//! Each invocation resolves the shared folder, processes files it has not
//! seen before, and writes one PDF summary per new file.

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
