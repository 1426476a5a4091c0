//! seobatch CLI — unattended batch crawls with one consolidated workbook.
//!
//! Runs the external SEO crawler once per URL in a list, then merges the
//! crawler's CSV exports into a single multi-sheet XLSX file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::run(cli).await
}
