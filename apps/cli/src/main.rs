//! nimefetch CLI: download a year's worth of NIME proceedings PDFs.
//!
//! Scans the papers index, picks out the PDF links for the target year, and
//! saves each one into a per-year folder, skipping files already on disk.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
