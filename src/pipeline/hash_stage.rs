//! Parallel content hashing with hash interning (spec §4.3). Generalizes the teacher's
//! `engine::hashing::hash_file`/`fill_entry_hash_if_needed` pair — fixed-Blake3, single call site
//! — into an `N`-worker pool pulling from a bounded feeder channel, with pluggable algorithms via
//! [`crate::hashing`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::config::ChannelCaps;
use crate::error::{EngineError, Result};
use crate::hashing;
use crate::intern::HashIntern;
use crate::pipeline::control::{CancellationToken, PauseGate};
use crate::pipeline::progress::ProgressCounters;
use crate::store::{Store, file_instances_repo, hash_cache_repo, scan_roots_repo};
use crate::types::{Category, FileInstance, HashAlgorithm};

struct FeedItem {
    instance: FileInstance,
    absolute_path: PathBuf,
}

/// Feeds `Discovered` file instances into `tx`, largest first, marking each `HashPending` as it
/// leaves the pool so a second feeder call never redelivers it. Runs on the calling thread
/// (normally the orchestrator's hash-stage driver).
///
/// Before queuing an instance for hashing, consults the Hash Cache (spec §4.3 "Cache semantics"):
/// if `(size, modified)` still matches what was last hashed at this path, the cached hash id is
/// carried straight onto the instance and it never reaches a hasher.
fn feed(
    store: &Store,
    pause_gate: &PauseGate,
    cancel: &CancellationToken,
    tx: &Sender<FeedItem>,
    counters: &ProgressCounters,
) -> Result<usize> {
    let mut root_paths: HashMap<i64, PathBuf> = HashMap::new();
    let mut total = 0usize;
    loop {
        pause_gate.wait_while_paused();
        cancel.check()?;

        let handle = store.acquire_read_handle()?;
        let batch = file_instances_repo::list_hash_pending_by_size_desc(handle.conn(), 256)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        drop(handle);
        if batch.is_empty() {
            break;
        }

        for instance in batch {
            let root_path = match root_paths.get(&instance.scan_root_id) {
                Some(p) => p.clone(),
                None => {
                    let read = store.acquire_read_handle()?;
                    let root = scan_roots_repo::get_scan_root(read.conn(), instance.scan_root_id)
                        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
                        .ok_or_else(|| {
                            EngineError::StorageIntegrity(format!(
                                "scan root {} missing",
                                instance.scan_root_id
                            ))
                        })?;
                    root_paths.insert(instance.scan_root_id, root.path.clone());
                    root.path
                }
            };
            let absolute_path = root_path.join(&instance.relative_path);

            let cached = {
                let read = store.acquire_read_handle()?;
                hash_cache_repo::get(read.conn(), instance.scan_root_id, &instance.relative_path)
                    .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            }
            .filter(|c| c.size_bytes == instance.size_bytes && c.modified_utc == instance.modified_utc);

            if let Some(cached) = cached {
                let write = store.acquire_write_handle();
                let id = instance.id;
                let hash_id = cached.hash_id;
                write
                    .submit(move |conn| file_instances_repo::mark_hashed(conn, id, hash_id))
                    .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
                counters.add_file_done(instance.size_bytes);
                total += 1;
                continue;
            }

            let write = store.acquire_write_handle();
            let id = instance.id;
            write.submit(move |conn| file_instances_repo::mark_hash_pending(conn, id))
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;

            pause_gate.wait_while_paused();
            cancel.check()?;
            if tx
                .send(FeedItem {
                    instance,
                    absolute_path,
                })
                .is_err()
            {
                return Ok(total);
            }
            total += 1;
        }
    }
    Ok(total)
}

fn hash_one(
    item: &FeedItem,
    algorithm: HashAlgorithm,
    movie_chunk_size_mb: i64,
) -> Result<hashing::HashOutput> {
    let size = item.instance.size_bytes.max(0) as u64;
    match algorithm {
        HashAlgorithm::SizeName => Ok(hashing::hash_size_name(size, &item.instance.file_name)),
        _ if item.instance.category == Category::Movie => {
            hashing::hash_movie_partial(algorithm, &item.absolute_path, size, movie_chunk_size_mb)
        }
        _ => hashing::hash_file(algorithm, &item.absolute_path, size),
    }
}

fn worker_loop(
    rx: Receiver<FeedItem>,
    store: Arc<Store>,
    intern: Arc<HashIntern>,
    algorithm: HashAlgorithm,
    movie_chunk_size_mb: i64,
    pause_gate: PauseGate,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
) {
    while let Ok(item) = rx.recv() {
        pause_gate.wait_while_paused();
        if cancel.is_cancelled() {
            break;
        }

        let result = hash_one(&item, algorithm, movie_chunk_size_mb).and_then(|output| {
            let now = Utc::now();
            let hash_id = intern.get_or_insert(
                &store,
                algorithm,
                output.bytes,
                output.hex,
                item.instance.size_bytes,
                output.partial_chunk_size_mb,
                now,
            )?;
            let write = store.acquire_write_handle();
            let instance_id = item.instance.id;
            let scan_root_id = item.instance.scan_root_id;
            let relative_path = item.instance.relative_path.clone();
            let size_bytes = item.instance.size_bytes;
            let modified_utc = item.instance.modified_utc;
            write
                .submit(move |conn| -> rusqlite::Result<()> {
                    file_instances_repo::mark_hashed(conn, instance_id, hash_id)?;
                    hash_cache_repo::upsert(
                        conn,
                        scan_root_id,
                        &relative_path,
                        size_bytes,
                        modified_utc,
                        hash_id,
                    )?;
                    Ok(())
                })
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))
        });

        match result {
            Ok(()) => counters.add_file_done(item.instance.size_bytes),
            Err(e) => {
                log::warn!("hash failed for {}: {}", item.absolute_path.display(), e);
                counters.add_error();
                let write = store.acquire_write_handle();
                let instance_id = item.instance.id;
                let message = e.to_string();
                let _ = write.submit(move |conn| {
                    file_instances_repo::mark_error(conn, instance_id, &message)
                });
            }
        }
    }
}

/// Run the hash stage to completion: feed `Discovered` instances, largest first, through
/// `worker_count` parallel hashers, until the pool is empty or cancellation fires.
pub fn run(
    store: Arc<Store>,
    intern: Arc<HashIntern>,
    algorithm: HashAlgorithm,
    movie_chunk_size_mb: i64,
    worker_count: usize,
    pause_gate: PauseGate,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
) -> Result<()> {
    let (tx, rx) = bounded::<FeedItem>(ChannelCaps::HASH_FEEDER);

    let handles: Vec<_> = (0..worker_count.max(1))
        .map(|_| {
            let rx = rx.clone();
            let store = Arc::clone(&store);
            let intern = Arc::clone(&intern);
            let pause_gate = pause_gate.clone();
            let cancel = cancel.clone();
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                worker_loop(
                    rx,
                    store,
                    intern,
                    algorithm,
                    movie_chunk_size_mb,
                    pause_gate,
                    cancel,
                    counters,
                )
            })
        })
        .collect();

    let feed_result = feed(&store, &pause_gate, &cancel, &tx, &counters);
    drop(tx);
    for h in handles {
        let _ = h.join();
    }
    feed_result.map(|_| ())
}
