//! Progress aggregation: shared atomic counters coalesced into a throttled event stream
//! (spec §4.7, §6). Cadence is driven by the CPU profile's UI update Hz.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Stage tag carried in a progress event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Hash,
    Plan,
    Copy,
    Verification,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scan => "Scan",
            Stage::Hash => "Hash",
            Stage::Plan => "Plan",
            Stage::Copy => "Copy",
            Stage::Verification => "Verification",
        }
    }
}

/// Shared, lock-free counters a stage's workers update as they make progress.
#[derive(Default)]
pub struct ProgressCounters {
    pub total_files: AtomicI64,
    pub done_files: AtomicI64,
    pub total_bytes: AtomicI64,
    pub done_bytes: AtomicI64,
    pub error_count: AtomicI64,
    current_path_epoch: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file_done(&self, bytes: i64) {
        self.done_files.fetch_add(1, Ordering::Relaxed);
        self.done_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// One throttled progress snapshot (spec §6's event envelope).
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub total_files: i64,
    pub done_files: i64,
    pub total_bytes: i64,
    pub done_bytes: i64,
    pub error_count: i64,
    pub current_path: Option<String>,
    pub mb_per_sec: f64,
    pub eta_seconds: Option<f64>,
    pub paused: bool,
}

/// Coalesces a [`ProgressCounters`] snapshot into events no more often than `cadence_hz`.
pub struct ProgressDispatcher {
    stage: Stage,
    cadence: Duration,
    last_emit: Instant,
    last_bytes: i64,
    last_elapsed: Duration,
    started: Instant,
}

impl ProgressDispatcher {
    pub fn new(stage: Stage, cadence_hz: f64) -> Self {
        let cadence = Duration::from_millis((1000.0 / cadence_hz.max(0.1)) as u64);
        let now = Instant::now();
        ProgressDispatcher {
            stage,
            cadence,
            last_emit: now,
            last_bytes: 0,
            last_elapsed: Duration::ZERO,
            started: now,
        }
    }

    /// Returns `Some(event)` if the cadence interval has elapsed since the last emission.
    pub fn maybe_emit(
        &mut self,
        counters: &ProgressCounters,
        current_path: Option<String>,
        paused: bool,
    ) -> Option<ProgressEvent> {
        let now = Instant::now();
        if now.duration_since(self.last_emit) < self.cadence {
            return None;
        }
        let elapsed = now.duration_since(self.started);
        let done_bytes = counters.done_bytes.load(Ordering::Relaxed);
        let delta_bytes = (done_bytes - self.last_bytes).max(0) as f64;
        let delta_secs = elapsed
            .saturating_sub(self.last_elapsed)
            .as_secs_f64()
            .max(0.001);
        let mb_per_sec = (delta_bytes / 1_000_000.0) / delta_secs;

        let total_bytes = counters.total_bytes.load(Ordering::Relaxed);
        let eta_seconds = if mb_per_sec > 0.0 && total_bytes > done_bytes {
            Some(((total_bytes - done_bytes) as f64 / 1_000_000.0) / mb_per_sec)
        } else {
            None
        };

        self.last_emit = now;
        self.last_bytes = done_bytes;
        self.last_elapsed = elapsed;

        Some(ProgressEvent {
            stage: self.stage.as_str(),
            total_files: counters.total_files.load(Ordering::Relaxed),
            done_files: counters.done_files.load(Ordering::Relaxed),
            total_bytes,
            done_bytes,
            error_count: counters.error_count.load(Ordering::Relaxed),
            current_path,
            mb_per_sec,
            eta_seconds,
            paused,
        })
    }
}
