//! Verification post-stage (spec §4.6): independent of the main state machine. Re-hashes source
//! and destination for every `Copied`/`Verified` Copy Job, concurrently per file pair, recording
//! one of the six outcomes. Worker pool shape mirrors `hash_stage::run`.

use std::path::Path;
use std::thread;

use crossbeam_channel::bounded;

use crate::config::ChannelCaps;
use crate::error::{EngineError, Result};
use crate::hashing;
use crate::pipeline::control::CancellationToken;
use crate::store::{Store, copy_jobs_repo, unique_files_repo};
use crate::types::{Category, CopyJob, CopyJobStatus, HashAlgorithm, VerificationOutcome, VerificationRecord};

/// True when `name` matches the conflict-resolution suffix pattern `<stem>_<8-hex>.<ext>`
/// (spec §4.6: "the record also notes was renamed").
fn looks_renamed(file_name: &str) -> bool {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let Some(idx) = stem.rfind('_') else { return false };
    let suffix = &stem[idx + 1..];
    suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

fn rehash_one(
    path: &Path,
    algorithm: HashAlgorithm,
    category: Category,
    partial_chunk_size_mb: Option<i64>,
) -> std::result::Result<String, VerificationOutcome> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Err(VerificationOutcome::SourceMissing),
    };
    let size = meta.len();
    let result = match algorithm {
        HashAlgorithm::SizeName => {
            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            Ok(hashing::hash_size_name(size, &file_name).hex)
        }
        _ if category == Category::Movie => {
            hashing::hash_movie_partial(algorithm, path, size, partial_chunk_size_mb.unwrap_or(8))
                .map(|o| o.hex)
        }
        _ => hashing::hash_file(algorithm, path, size).map(|o| o.hex),
    };
    result.map_err(|_| VerificationOutcome::ReadError)
}

struct VerificationInput {
    job: CopyJob,
    source_full_path: std::path::PathBuf,
    expected_hash_hex: String,
    expected_size_bytes: i64,
    category: Category,
    partial_chunk_size_mb: Option<i64>,
}

fn verify_one(input: &VerificationInput, algorithm: HashAlgorithm) -> VerificationRecord {
    let destination = Path::new(&input.job.destination_full_path);
    let dest_file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let was_renamed = looks_renamed(&dest_file_name);

    let source_exists = input.source_full_path.exists();
    let dest_exists = destination.exists();

    if !source_exists && !dest_exists {
        return VerificationRecord {
            copy_job_id: input.job.id,
            outcome: VerificationOutcome::SourceMissing,
            source_hash_hex: None,
            dest_hash_hex: None,
            was_renamed,
        };
    }
    if !source_exists {
        return VerificationRecord {
            copy_job_id: input.job.id,
            outcome: VerificationOutcome::SourceMissing,
            source_hash_hex: None,
            dest_hash_hex: None,
            was_renamed,
        };
    }
    if !dest_exists {
        return VerificationRecord {
            copy_job_id: input.job.id,
            outcome: VerificationOutcome::DestMissing,
            source_hash_hex: None,
            dest_hash_hex: None,
            was_renamed,
        };
    }

    let source_size = std::fs::metadata(&input.source_full_path).map(|m| m.len()).unwrap_or(0);
    let dest_size = std::fs::metadata(destination).map(|m| m.len()).unwrap_or(0);
    if source_size != dest_size {
        return VerificationRecord {
            copy_job_id: input.job.id,
            outcome: VerificationOutcome::SizeMismatch,
            source_hash_hex: None,
            dest_hash_hex: None,
            was_renamed,
        };
    }

    let source_hash = rehash_one(&input.source_full_path, algorithm, input.category, input.partial_chunk_size_mb);
    let dest_hash = rehash_one(destination, algorithm, input.category, input.partial_chunk_size_mb);

    match (source_hash, dest_hash) {
        (Ok(s), Ok(d)) => {
            let outcome = if s.eq_ignore_ascii_case(&d) {
                VerificationOutcome::Matched
            } else {
                VerificationOutcome::HashMismatch
            };
            VerificationRecord {
                copy_job_id: input.job.id,
                outcome,
                source_hash_hex: Some(s),
                dest_hash_hex: Some(d),
                was_renamed,
            }
        }
        (Err(e), _) | (_, Err(e)) => VerificationRecord {
            copy_job_id: input.job.id,
            outcome: e,
            source_hash_hex: None,
            dest_hash_hex: None,
            was_renamed,
        },
    }
}

/// Collect the `Copied`/`Verified` jobs with enough context to re-hash both ends, matching the
/// join `claim_pending_jobs` already performs for live copy jobs.
fn collect_inputs(store: &Store) -> Result<Vec<VerificationInput>> {
    let handle = store.acquire_read_handle()?;
    let conn = handle.conn();
    let mut jobs = copy_jobs_repo::list_by_status(conn, CopyJobStatus::Copied)
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    jobs.extend(
        copy_jobs_repo::list_by_status(conn, CopyJobStatus::Verified)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?,
    );

    let mut inputs = Vec::with_capacity(jobs.len());
    for job in jobs {
        let Some(uf) = unique_files_repo::get(conn, job.unique_file_id)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        else {
            continue;
        };
        let Some(source_instance) =
            crate::store::file_instances_repo::get(conn, uf.representative_file_instance_id)
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        else {
            continue;
        };
        let Some(scan_root) = crate::store::scan_roots_repo::get_scan_root(conn, source_instance.scan_root_id)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        else {
            continue;
        };
        let Some(hash) = crate::store::hashes_repo::get_by_id(conn, uf.hash_id)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        else {
            continue;
        };
        let source_full_path = scan_root.path.join(&source_instance.relative_path);
        inputs.push(VerificationInput {
            job,
            source_full_path,
            expected_hash_hex: hash.hash_hex,
            expected_size_bytes: hash.size_bytes,
            category: uf.file_type_category,
            partial_chunk_size_mb: hash.partial_hash_info.map(|p| p.chunk_size_mb),
        });
    }
    Ok(inputs)
}

/// Run the verification post-stage: re-hash every `Copied`/`Verified` job's source and
/// destination across `worker_count` threads, honoring cancellation, and return one record per
/// job (order not guaranteed).
pub fn run(
    store: &Store,
    algorithm: HashAlgorithm,
    worker_count: usize,
    cancel: CancellationToken,
) -> Result<Vec<VerificationRecord>> {
    let inputs = collect_inputs(store)?;
    let (tx, rx) = bounded::<VerificationInput>(ChannelCaps::HASH_FEEDER);
    let (result_tx, result_rx) = bounded::<VerificationRecord>(ChannelCaps::HASH_FEEDER);

    let handles: Vec<_> = (0..worker_count.max(1))
        .map(|_| {
            let rx = rx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                while let Ok(input) = rx.recv() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let record = verify_one(&input, algorithm);
                    let _ = result_tx.send(record);
                }
            })
        })
        .collect();
    drop(result_tx);

    let expected = inputs.len();
    for input in inputs {
        if cancel.check().is_err() {
            break;
        }
        if tx.send(input).is_err() {
            break;
        }
    }
    drop(tx);

    let mut records = Vec::with_capacity(expected);
    while let Ok(record) = result_rx.recv() {
        records.push(record);
    }
    for h in handles {
        let _ = h.join();
    }
    Ok(records)
}
