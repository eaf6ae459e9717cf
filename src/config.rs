//! Application configuration constants: tuning, thresholds, channel capacities.

use std::sync::OnceLock;

// ---- Package / on-disk layout ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    db_filename: &'static str,
    logs_dir_name: &'static str,
    debug_log_name: &'static str,
    warnings_log_name: &'static str,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| PackagePaths {
            db_filename: "Project.db",
            logs_dir_name: "Logs",
            debug_log_name: "Debug.log",
            warnings_log_name: "WarningsErrors.log",
        })
    }

    pub fn db_filename(&self) -> &'static str {
        self.db_filename
    }

    pub fn logs_dir_name(&self) -> &'static str {
        self.logs_dir_name
    }

    pub fn debug_log_name(&self) -> &'static str {
        self.debug_log_name
    }

    pub fn warnings_log_name(&self) -> &'static str {
        self.warnings_log_name
    }
}

// ---- Worker threads / CPU profile ----

/// Thread limits used when deriving hasher/copy-worker counts from a CPU profile.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    pub all_threads: usize,
}

impl WorkerThreadLimits {
    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
        }
    }
}

// ---- Progress ----

pub struct ProgressConsts;

impl ProgressConsts {
    /// Minimum chunk size for adaptive progress batching (avoid too-frequent updates).
    pub const ADAPTIVE_CHUNK_MIN: usize = 10;
}

// ---- Hashing ----

pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below the mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
    /// Minimum read buffer size (spec §4.3: "a fixed-size buffer (>= 64 KiB)").
    pub const HASH_READ_MIN_BUFFER: usize = 64 * 1024;
}

// ---- Copy executor ----

pub struct CopyConsts;

impl CopyConsts {
    /// Chunk size for copy I/O (bytes). 1 MiB per spec §4.5.
    pub const COPY_CHUNK_SIZE: usize = 1024 * 1024;
    /// Max attempts per copy job (spec §4.5 retry policy).
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Backoff base (ms); actual backoff is `BACKOFF_BASE_MS * 2^attempt`.
    pub const BACKOFF_BASE_MS: u64 = 100;
}

// ---- Database ----

/// Batch size for DB insert chunks (spec §4.1: up to 10,000 rows per commit).
pub const DB_INSERT_BATCH_SIZE: usize = 10_000;

// ---- Streaming channel capacities (spec §5) ----

pub struct ChannelCaps;

impl ChannelCaps {
    pub const ENUMERATOR_TO_WRITER: usize = 50_000;
    pub const HASH_FEEDER: usize = 1_000;
    pub const COPY_FEEDER: usize = 100;
}

// ---- CPU profile → worker derivation (spec §4.3 table) ----

impl crate::types::CpuProfile {
    /// (hasher_count, copy_worker_count, ui_update_hz) for this profile given available cores.
    pub fn worker_counts(&self, available_threads: usize) -> (usize, usize, f64) {
        let avail = available_threads.max(1);
        match self {
            crate::types::CpuProfile::Eco => (1, 1, 1.0),
            crate::types::CpuProfile::Balanced => ((avail / 4).max(1), 2, 5.0),
            crate::types::CpuProfile::Fast => {
                (((avail as f64 * 0.75).round() as usize).max(1), 2, 5.0)
            }
            crate::types::CpuProfile::Max => {
                let hashers = avail.saturating_sub(1).max(1);
                let copy_workers = if avail >= 8 { 4 } else { 2 };
                (hashers, copy_workers, 5.0)
            }
        }
    }
}
