//! Concurrent copy execution: atomic claim, safe write, verify, retry, conflict resolution
//! (spec §4.5). `claim_pending_jobs` is modeled on the teacher's "batched writer, serialized
//! transaction" discipline (`engine::db_ops::indexer::apply_index_diff`'s `tx.prepare` / loop /
//! `tx.commit()` shape), generalized from "upsert a batch" to "select-then-update, return rows".
//! The temp-file-beside-destination protocol mirrors the teacher's own
//! `utils::tempfiles::prepare_index_work_path` / `rename_temp_to_final` trick — never let a
//! partially written file occupy the final name — applied per copy job instead of once per index
//! write.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, bounded};

use crate::config::{ChannelCaps, CopyConsts};
use crate::error::{EngineError, Result};
use crate::hashing;
use crate::pipeline::control::{CancellationToken, PauseGate};
use crate::pipeline::progress::ProgressCounters;
use crate::store::{Store, copy_jobs_repo, folder_nodes_repo, unique_files_repo};
use crate::types::{Category, HashAlgorithm, JobDetail};
use crate::utils::tempfiles;

/// Purge existing Copy Jobs and create one per copy-enabled Unique File whose planned folder
/// (and, by cascade, ancestors) is also copy-enabled (spec §4.5 "job creation").
pub fn prepare_copy_jobs(store: &Store, target_root: &Path) -> Result<i64> {
    let write = store.acquire_write_handle();
    write
        .submit(|conn| copy_jobs_repo::clear_all(conn))
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;

    let unique_files = {
        let handle = store.acquire_read_handle()?;
        unique_files_repo::list_copy_enabled(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
    };

    let mut created = 0i64;
    for uf in unique_files {
        let Some(folder_id) = uf.planned_folder_node_id else {
            continue;
        };
        let folder = {
            let handle = store.acquire_read_handle()?;
            folder_nodes_repo::get(handle.conn(), folder_id)
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        };
        let Some(folder) = folder else { continue };
        if !folder.copy_enabled {
            continue;
        }
        let destination = target_root
            .join(&folder.proposed_relative_path)
            .join(&uf.planned_file_name);
        let destination_str = destination.to_string_lossy().to_string();
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| copy_jobs_repo::create(conn, uf.id, &destination_str))
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        created += 1;
    }
    Ok(created)
}

/// Temp file name for `job_id` beside `planned_destination` (spec §4.5 step 4: the job id suffix
/// avoids two racing workers colliding on the same temp name).
fn temp_path_for(planned_destination: &Path, job_id: i64) -> PathBuf {
    tempfiles::temp_path_beside(planned_destination, &job_id.to_string())
}

/// Recompute the hash of an existing on-disk file the same way the hash stage would have, so
/// conflict detection and post-copy verification agree with what is stored in `Hashes`.
fn rehash(
    path: &Path,
    algorithm: HashAlgorithm,
    category: Category,
    partial_chunk_size_mb: Option<i64>,
    size: u64,
) -> Result<String> {
    match algorithm {
        HashAlgorithm::SizeName => {
            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            Ok(hashing::hash_size_name(size, &file_name).hex)
        }
        _ if category == Category::Movie => {
            let chunk = partial_chunk_size_mb.unwrap_or(8);
            Ok(hashing::hash_movie_partial(algorithm, path, size, chunk)?.hex)
        }
        _ => Ok(hashing::hash_file(algorithm, path, size)?.hex),
    }
}

fn hash_matches(
    path: &Path,
    expected_hex: &str,
    expected_size: i64,
    algorithm: HashAlgorithm,
    category: Category,
    partial_chunk_size_mb: Option<i64>,
) -> Result<bool> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(EngineError::from_io(path, e)),
    };
    if meta.len() as i64 != expected_size {
        return Ok(false);
    }
    let hex = rehash(path, algorithm, category, partial_chunk_size_mb, meta.len())?;
    Ok(hex.eq_ignore_ascii_case(expected_hex))
}

/// Resolve a conflict-free destination. A "conflict" is an existing, different-content file at
/// the planned path (spec §4.5 "Conflict resolution"): append `_<hash8>` before the extension.
/// A second-level collision (two different hashes sharing the same 8-hex prefix) appends an
/// incrementing counter.
#[allow(clippy::too_many_arguments)]
fn resolve_destination(
    planned_destination: &Path,
    expected_hex: &str,
    expected_size: i64,
    algorithm: HashAlgorithm,
    category: Category,
    partial_chunk_size_mb: Option<i64>,
) -> Result<(PathBuf, bool)> {
    if !planned_destination.exists()
        || hash_matches(
            planned_destination,
            expected_hex,
            expected_size,
            algorithm,
            category,
            partial_chunk_size_mb,
        )?
    {
        return Ok((planned_destination.to_path_buf(), false));
    }

    let stem = planned_destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = planned_destination.extension().map(|e| e.to_string_lossy().to_string());
    let short_hash = &expected_hex[..expected_hex.len().min(8)];

    let mut candidate_name = match &ext {
        Some(ext) => format!("{stem}_{short_hash}.{ext}"),
        None => format!("{stem}_{short_hash}"),
    };
    let mut counter = 1u32;
    loop {
        let candidate = planned_destination.with_file_name(&candidate_name);
        if !candidate.exists()
            || hash_matches(
                &candidate,
                expected_hex,
                expected_size,
                algorithm,
                category,
                partial_chunk_size_mb,
            )?
        {
            return Ok((candidate, true));
        }
        candidate_name = match &ext {
            Some(ext) => format!("{stem}_{short_hash}_{counter}.{ext}"),
            None => format!("{stem}_{short_hash}_{counter}"),
        };
        counter += 1;
    }
}

fn copy_with_pause(
    source: &Path,
    temp_path: &Path,
    pause_gate: &PauseGate,
    cancel: &CancellationToken,
    counters: &ProgressCounters,
) -> Result<u64> {
    let mut src = File::open(source).map_err(|e| EngineError::from_io(source, e))?;
    let mut dst = File::create(temp_path).map_err(|e| EngineError::from_io(temp_path, e))?;
    let mut buffer = vec![0u8; CopyConsts::COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        pause_gate.wait_while_paused();
        if let Err(e) = cancel.check() {
            let _ = fs::remove_file(temp_path);
            return Err(e);
        }
        let n = src.read(&mut buffer).map_err(|e| EngineError::from_io(source, e))?;
        if n == 0 {
            break;
        }
        dst.write_all(&buffer[..n])
            .map_err(|e| EngineError::from_io(temp_path, e))?;
        total += n as u64;
        counters.done_bytes.fetch_add(n as i64, std::sync::atomic::Ordering::Relaxed);
    }
    dst.flush().map_err(|e| EngineError::from_io(temp_path, e))?;
    Ok(total)
}

/// Preserve the source's modification time on the freshly copied file. Only `mtime` is carried
/// over — std exposes no portable way to set a file's creation/birth time, and nothing in the
/// dependency stack fills that gap.
fn preserve_timestamps(source: &Path, dest: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| EngineError::from_io(source, e))?;
    if let Ok(modified) = meta.modified() {
        let dest_file = File::options()
            .write(true)
            .open(dest)
            .map_err(|e| EngineError::from_io(dest, e))?;
        let _ = dest_file.set_modified(modified);
    }
    Ok(())
}

fn run_one_job(
    detail: &JobDetail,
    algorithm: HashAlgorithm,
    verify_after_copy: bool,
    pause_gate: &PauseGate,
    cancel: &CancellationToken,
    counters: &ProgressCounters,
) -> std::result::Result<(PathBuf, bool, bool), (String, bool)> {
    let source = &detail.source_full_path;
    if !source.exists() {
        return Err(("source missing".to_string(), true));
    }

    let planned_destination = Path::new(&detail.job.destination_full_path);
    let (destination, was_renamed) = resolve_destination(
        planned_destination,
        &detail.expected_hash_hex,
        detail.expected_size_bytes,
        algorithm,
        detail.category,
        detail.partial_chunk_size_mb,
    )
    .map_err(|e| (e.to_string(), false))?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| (e.to_string(), false))?;
    }

    let temp_path = temp_path_for(&destination, detail.job.id);
    copy_with_pause(source, &temp_path, pause_gate, cancel, counters)
        .map_err(|e| (e.to_string(), matches!(e, EngineError::Cancelled)))?;
    let _ = preserve_timestamps(source, &temp_path);

    let mut verified = false;
    if verify_after_copy {
        let matches = hash_matches(
            &temp_path,
            &detail.expected_hash_hex,
            detail.expected_size_bytes,
            algorithm,
            detail.category,
            detail.partial_chunk_size_mb,
        )
        .unwrap_or(false);
        if !matches {
            let _ = fs::remove_file(&temp_path);
            return Err(("verification mismatch".to_string(), false));
        }
        verified = true;
    }

    tempfiles::rename_temp_to_final(&temp_path, &destination).map_err(|e| (e.to_string(), false))?;

    Ok((destination, was_renamed, verified))
}

fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_millis(CopyConsts::BACKOFF_BASE_MS * 2u64.saturating_pow(attempt))
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    rx: Receiver<JobDetail>,
    store: Arc<Store>,
    algorithm: HashAlgorithm,
    verify_after_copy: bool,
    pause_gate: PauseGate,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
) {
    while let Ok(detail) = rx.recv() {
        pause_gate.wait_while_paused();
        if cancel.is_cancelled() {
            break;
        }

        match run_one_job(&detail, algorithm, verify_after_copy, &pause_gate, &cancel, &counters) {
            Ok((actual_destination, was_renamed, verified)) => {
                let _ = was_renamed;
                let now = Utc::now();
                let dest_str = actual_destination.to_string_lossy().to_string();
                let job_id = detail.job.id;
                let unique_file_id = detail.job.unique_file_id;
                let write = store.acquire_write_handle();
                let _ = write.submit(move |conn| -> rusqlite::Result<()> {
                    copy_jobs_repo::update_destination(conn, job_id, &dest_str)?;
                    if verified {
                        copy_jobs_repo::mark_verified(conn, job_id, now)?;
                        unique_files_repo::mark_verified(conn, unique_file_id, now)?;
                    } else {
                        copy_jobs_repo::mark_copied(conn, job_id, now)?;
                    }
                    unique_files_repo::mark_copied(conn, unique_file_id, now)?;
                    Ok(())
                });
                counters.add_file_done(detail.expected_size_bytes);
            }
            Err((message, non_retryable)) => {
                if message == "source missing" {
                    let job_id = detail.job.id;
                    let write = store.acquire_write_handle();
                    let _ = write.submit(move |conn| copy_jobs_repo::mark_skipped(conn, job_id, "source missing"));
                    continue;
                }
                let attempt = detail.job.attempt_count as u32;
                let final_failure = non_retryable || attempt >= CopyConsts::MAX_ATTEMPTS;
                let job_id = detail.job.id;
                let write = store.acquire_write_handle();
                let msg = message.clone();
                let _ = write.submit(move |conn| {
                    copy_jobs_repo::record_failure(conn, job_id, &msg, final_failure)
                });
                counters.add_error();
                if !final_failure {
                    thread::sleep(backoff_duration(attempt));
                }
            }
        }
    }
}

/// Run the copy stage to completion: claim jobs in batches, dispatch to `worker_count` parallel
/// workers, until the Pending pool is empty or cancellation fires.
#[allow(clippy::too_many_arguments)]
pub fn run(
    store: Arc<Store>,
    algorithm: HashAlgorithm,
    verify_after_copy: bool,
    worker_count: usize,
    pause_gate: PauseGate,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
) -> Result<()> {
    let (tx, rx) = bounded::<JobDetail>(ChannelCaps::COPY_FEEDER);

    let handles: Vec<_> = (0..worker_count.max(1))
        .map(|_| {
            let rx = rx.clone();
            let store = Arc::clone(&store);
            let pause_gate = pause_gate.clone();
            let cancel = cancel.clone();
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                worker_loop(rx, store, algorithm, verify_after_copy, pause_gate, cancel, counters)
            })
        })
        .collect();

    loop {
        pause_gate.wait_while_paused();
        cancel.check()?;

        let details = {
            let write = store.acquire_write_handle();
            let now = Utc::now();
            write
                .submit(move |conn| copy_jobs_repo::claim_pending_jobs(conn, 64, now))
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        };
        if details.is_empty() {
            break;
        }
        for detail in details {
            if tx.send(detail).is_err() {
                break;
            }
        }
    }
    drop(tx);
    for h in handles {
        let _ = h.join();
    }
    Ok(())
}

/// Reset every `InProgress` job back to `Pending` (spec §4.5 cancellation semantics). Called by
/// the orchestrator after a cancelled copy stage.
pub fn reset_in_progress_to_pending(store: &Store) -> Result<()> {
    let write = store.acquire_write_handle();
    write
        .submit(|conn| {
            conn.execute(
                "UPDATE CopyJobs SET Status = 'Pending', AttemptCount = MAX(AttemptCount - 1, 0) \
                 WHERE Status = 'InProgress'",
                [],
            )
        })
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    Ok(())
}
