//! Embedded relational store (spec §4.1, §6): schema, single-writer actor, and one repo module
//! per entity table. Every mutating call goes through a [`WriteHandle`]; reads go through a
//! [`ReadHandle`] on its own connection so they never block behind a write.

mod connection;
mod schema;
mod writer;

pub mod copy_jobs_repo;
pub mod file_instances_repo;
pub mod folder_nodes_repo;
pub mod hash_cache_repo;
pub mod hashes_repo;
pub mod scan_roots_repo;
pub mod settings_repo;
pub mod unique_files_repo;

pub use connection::{ReadHandle, Store, WriteHandle};
