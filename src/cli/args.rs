//! CLI argument parsing (clap derive): a top-level [`Cli`] carrying global flags plus a
//! [`Commands`] enum, one subcommand per pipeline stage.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mediavault", version, about = "Single-user local media-deduplication backup engine")]
pub struct Cli {
    /// Project directory holding Project.db and Logs/ (spec §6). Created if missing.
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize or update project settings. `hash_level` is fixed once the project has hashed
    /// anything: rerunning `init` with a different value after that point is rejected.
    Init {
        #[arg(long)]
        name: Option<String>,
        /// sha1 | sha256 | sha3-256 | sizename — immutable once any file has been hashed
        #[arg(long)]
        hash_level: Option<String>,
        /// eco | balanced | fast | max
        #[arg(long)]
        cpu_profile: Option<String>,
    },
    /// Register a source directory to scan.
    AddRoot {
        path: PathBuf,
        #[arg(long)]
        label: Option<String>,
    },
    /// Enumerate every enabled scan root into File Instances.
    Scan,
    /// Hash every discovered File Instance.
    Hash,
    /// Build the duplicate-grouping / destination-folder plan.
    Plan,
    /// Copy planned Unique Files to `target`.
    Copy { target: PathBuf },
    /// Re-verify previously copied files against their recorded hash (spec §4.6).
    Verify,
    /// Print current pipeline state and per-stage counts.
    Status,
}
