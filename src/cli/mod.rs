//! Command-line frontend over the `mediavault` library.

pub mod args;
pub mod commands;
pub(crate) mod project_toml;

pub use args::Cli;

use crate::error::Result;

pub fn run(cli: Cli) -> Result<()> {
    commands::run(cli)
}
