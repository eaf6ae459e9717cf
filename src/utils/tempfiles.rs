//! Temp-file-beside-destination helpers used by the copy executor (spec §4.5 step 4): never let
//! a partially written file occupy its final name. Generalizes the teacher's whole-database
//! `prepare_index_work_path`/`rename_temp_to_final` swap (one rename per index write) down to
//! per-copy-job granularity.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Temp path beside `final_path`, suffixed so two different final paths never collide
/// (`<name>.<suffix>.tmp`).
pub fn temp_path_beside(final_path: &Path, suffix: &str) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    final_path.with_file_name(format!("{file_name}.{suffix}.tmp"))
}

/// Atomically replace `final_path` with `temp_path`. An existing file at the destination is
/// removed first — some platforms refuse to rename over an existing file.
pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    if final_path.exists() {
        fs::remove_file(final_path).map_err(|e| EngineError::from_io(final_path, e))?;
    }
    fs::rename(temp_path, final_path).map_err(|e| EngineError::from_io(final_path, e))
}
