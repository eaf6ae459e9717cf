//! mediavault: single-user, local media-deduplication backup engine. Streams directory
//! enumeration, parallel content hashing with atomic interning, duplicate-group plan generation,
//! and concurrent copy execution with verification — all persisted in an embedded relational
//! store for resumability.

pub mod cli;
pub mod config;
pub mod error;
pub mod fd_limit;
pub mod hashing;
pub mod intern;
pub mod logging;
pub mod path_tools;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{EngineError, Result};
pub use pipeline::orchestrator::PipelineOrchestrator;
pub use store::Store;
