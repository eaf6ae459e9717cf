//! mediavault CLI: run the scan/hash/plan/copy pipeline against a project directory.

use anyhow::Result;
use clap::Parser;
use mediavault::cli::{self, Cli};
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    cli::run(cli)?;
    log::debug!("total time: {:?}", start_time.elapsed());
    Ok(())
}
