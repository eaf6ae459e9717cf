//! Pipeline orchestrator (spec §4.7): drives the stages in sequence, owns the pause gate,
//! cancellation token, and sleep-inhibit lease holder, and is the only caller allowed to move
//! `AppState` — every transition goes through [`state_machine::validate`] before it is persisted.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::intern::HashIntern;
use crate::pipeline::control::{CancellationToken, NoopSleepInhibitor, PauseGate, SleepInhibitLeaseHolder, SleepInhibitor};
use crate::pipeline::progress::ProgressCounters;
use crate::pipeline::{copy_executor, enumerator, hash_stage, plan_builder, state_machine};
use crate::store::{
    Store, copy_jobs_repo, file_instances_repo, folder_nodes_repo, hashes_repo, scan_roots_repo,
    settings_repo, unique_files_repo,
};
use crate::types::{AppState, ProjectSettings, ScanRoot};

/// Feeds enumerated candidates into the store in batches, draining the channel on its own
/// thread so the enumerator never blocks on anything but the channel's own backpressure.
const CANDIDATE_FLUSH_SIZE: usize = 500;

pub struct PipelineOrchestrator {
    store: Arc<Store>,
    intern: Arc<HashIntern>,
    pause_gate: PauseGate,
    cancel: CancellationToken,
    sleep_inhibitor: Arc<SleepInhibitLeaseHolder>,
}

impl PipelineOrchestrator {
    /// Open against an already-initialized store, priming the hash intern map from its existing
    /// `Hashes` rows so a resumed session doesn't recompute hashes it already has on file.
    pub fn open(store: Arc<Store>) -> Result<Self> {
        Self::open_with_sleep_inhibitor(store, Arc::new(NoopSleepInhibitor))
    }

    pub fn open_with_sleep_inhibitor(
        store: Arc<Store>,
        sleep_inhibitor: Arc<dyn SleepInhibitor>,
    ) -> Result<Self> {
        let intern = Arc::new(HashIntern::new());
        intern.prime(&store)?;
        Ok(PipelineOrchestrator {
            store,
            intern,
            pause_gate: PauseGate::new(),
            cancel: CancellationToken::new(),
            sleep_inhibitor: Arc::new(SleepInhibitLeaseHolder::new(sleep_inhibitor)),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn pause_gate(&self) -> &PauseGate {
        &self.pause_gate
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn settings(&self) -> Result<ProjectSettings> {
        let handle = self.store.acquire_read_handle()?;
        settings_repo::get_settings(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .ok_or_else(|| EngineError::Configuration("project settings not initialized".to_string()))
    }

    fn current_state(&self) -> Result<AppState> {
        Ok(self.settings()?.current_state)
    }

    /// Move `ProjectSettings.current_state` to `to`, rejecting the move if it is not in the
    /// documented transition table (spec §4.7).
    fn transition(&self, to: AppState) -> Result<()> {
        let from = self.current_state()?;
        state_machine::validate(from, to).map_err(|e| EngineError::Configuration(e.to_string()))?;
        let write = self.store.acquire_write_handle();
        let now = Utc::now();
        write
            .submit(move |conn| settings_repo::set_state(conn, to, now))
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))
    }

    /// Rescan policy (spec §4.2): before re-enumerating a root, a topology change is assumed, so
    /// the whole plan is invalidated first — Copy Jobs, Unique Files and Folder Nodes are purged,
    /// then the root's File Instances are deleted, then orphaned Hash rows are garbage-collected.
    /// Order matters: `CopyJobs.UniqueFileId` and `UniqueFiles.RepresentativeFileInstanceId` have
    /// no `ON DELETE CASCADE` and foreign keys are enforced, so deleting a table before everything
    /// that references it would fail with a constraint violation the moment a plan (or a copy)
    /// has ever been built for this project.
    pub fn clear_root(&self, scan_root_id: i64) -> Result<()> {
        let write = self.store.acquire_write_handle();
        write
            .submit(move |conn| -> rusqlite::Result<()> {
                let tx = conn.transaction()?;
                copy_jobs_repo::clear_all(&tx)?;
                unique_files_repo::clear_all(&tx)?;
                folder_nodes_repo::clear_all(&tx)?;
                file_instances_repo::delete_by_scan_root(&tx, scan_root_id)?;
                hashes_repo::prune_orphaned(&tx)?;
                tx.commit()?;
                Ok(())
            })
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))
    }

    /// Run the enumeration stage over every enabled Scan Root, clearing each root first per the
    /// rescan policy, then persisting emitted candidates in batches from a dedicated writer
    /// thread (keeping the enumerator itself blocked only on channel backpressure).
    pub fn run_scan(
        &self,
        filter: &enumerator::EnumerationFilter,
        counters: Arc<ProgressCounters>,
    ) -> Result<()> {
        self.transition(AppState::Scanning)?;
        let lease = self.sleep_inhibitor.acquire();

        let roots: Vec<ScanRoot> = {
            let handle = self.store.acquire_read_handle()?;
            scan_roots_repo::list_scan_roots(handle.conn())
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        };

        for root in roots.iter().filter(|r| r.is_enabled) {
            self.clear_root(root.id)?;
        }

        let (tx, rx) = enumerator::new_candidate_channel();
        let store = Arc::clone(&self.store);
        let writer_handle = thread::spawn(move || -> Result<()> {
            let mut batch = Vec::with_capacity(CANDIDATE_FLUSH_SIZE);
            let flush = |batch: &mut Vec<crate::types::Candidate>| -> Result<()> {
                if batch.is_empty() {
                    return Ok(());
                }
                let candidates = std::mem::take(batch);
                let write = store.acquire_write_handle();
                write
                    .submit(move |conn| {
                        file_instances_repo::batch_insert_candidates(conn, &candidates, Utc::now())
                    })
                    .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
                Ok(())
            };
            while let Ok(candidate) = rx.recv() {
                batch.push(candidate);
                if batch.len() >= CANDIDATE_FLUSH_SIZE {
                    flush(&mut batch)?;
                }
            }
            flush(&mut batch)
        });

        let mut scan_error: Option<EngineError> = None;
        for root in roots.iter().filter(|r| r.is_enabled) {
            match enumerator::scan_root(root.id, &root.path, filter, &self.pause_gate, &self.cancel, &tx) {
                Ok(outcome) => {
                    counters
                        .total_files
                        .fetch_add(outcome.candidates_emitted as i64, std::sync::atomic::Ordering::Relaxed);
                }
                Err(e) => {
                    scan_error = Some(e);
                    break;
                }
            }
        }
        drop(tx);
        let writer_result = writer_handle.join().map_err(|_| {
            EngineError::StorageIntegrity("candidate writer thread panicked".to_string())
        })?;

        for root in roots.iter().filter(|r| r.is_enabled) {
            let write = self.store.acquire_write_handle();
            let id = root.id;
            let now = Utc::now();
            write
                .submit(move |conn| scan_roots_repo::record_scan_completed(conn, id, now))
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        }

        drop(lease);
        writer_result?;

        if let Some(e) = scan_error {
            self.transition(AppState::Idle)?;
            return Err(e);
        }
        Ok(())
    }

    /// Run the hash stage to completion, then advance to `Planning`.
    pub fn run_hash(&self, worker_count: usize, counters: Arc<ProgressCounters>) -> Result<()> {
        let from = self.current_state()?;
        if from != AppState::Hashing {
            self.transition(AppState::Hashing)?;
        }
        let lease = self.sleep_inhibitor.acquire();
        let settings = self.settings()?;
        let result = hash_stage::run(
            Arc::clone(&self.store),
            Arc::clone(&self.intern),
            settings.hash_level,
            settings.movie_hash_chunk_size_mb,
            worker_count,
            self.pause_gate.clone(),
            self.cancel.clone(),
            counters,
        );
        drop(lease);
        result?;

        if self.cancel.is_cancelled() {
            self.transition(AppState::Idle)?;
            return Err(EngineError::Cancelled);
        }
        self.transition(AppState::Planning)
    }

    /// Run the plan builder, then advance to `ReadyToCopy`.
    pub fn run_plan(&self) -> Result<plan_builder::PlanSummary> {
        let from = self.current_state()?;
        if from != AppState::Planning {
            self.transition(AppState::Planning)?;
        }
        let summary = plan_builder::build_plan(&self.store)?;
        self.transition(AppState::ReadyToCopy)?;
        Ok(summary)
    }

    /// Run the copy stage against `target_root`, then advance to `Completed`.
    pub fn run_copy(
        &self,
        target_root: &Path,
        worker_count: usize,
        counters: Arc<ProgressCounters>,
    ) -> Result<()> {
        let from = self.current_state()?;
        if from != AppState::Copying {
            self.transition(AppState::Copying)?;
        }
        let lease = self.sleep_inhibitor.acquire();
        copy_executor::prepare_copy_jobs(&self.store, target_root)?;
        let settings = self.settings()?;
        let result = copy_executor::run(
            Arc::clone(&self.store),
            settings.hash_level,
            settings.verify_by_default,
            worker_count,
            self.pause_gate.clone(),
            self.cancel.clone(),
            counters,
        );
        drop(lease);

        if let Err(e) = result {
            copy_executor::reset_in_progress_to_pending(&self.store)?;
            if matches!(e, EngineError::Cancelled) {
                self.transition(AppState::Idle)?;
            }
            return Err(e);
        }
        self.transition(AppState::Completed)
    }

    /// Pause the active stage (Scanning/Hashing/Copying only — spec §4.7).
    pub fn pause(&self) -> Result<()> {
        let from = self.current_state()?;
        let to = match from {
            AppState::Scanning => AppState::ScanPaused,
            AppState::Hashing => AppState::HashPaused,
            AppState::Copying => AppState::CopyPaused,
            _ => {
                return Err(EngineError::Configuration(format!(
                    "cannot pause from state {}",
                    from.as_str()
                )));
            }
        };
        self.transition(to)?;
        self.pause_gate.pause();
        Ok(())
    }

    /// Resume a paused stage.
    pub fn resume(&self) -> Result<()> {
        let from = self.current_state()?;
        let to = match from {
            AppState::ScanPaused => AppState::Scanning,
            AppState::HashPaused => AppState::Hashing,
            AppState::CopyPaused => AppState::Copying,
            _ => {
                return Err(EngineError::Configuration(format!(
                    "cannot resume from state {}",
                    from.as_str()
                )));
            }
        };
        self.pause_gate.resume();
        self.transition(to)
    }

    /// Request cancellation and unblock any worker currently parked on the pause gate so it can
    /// observe it.
    pub fn request_cancel(&self) {
        self.cancel.cancel();
        self.pause_gate.resume();
    }
}
