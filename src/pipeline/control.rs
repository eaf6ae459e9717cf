//! Pause gate, cancellation token, and sleep-inhibit leases (spec §4.7, §5).
//!
//! The teacher has no pause/resume concept (its walk runs to completion or aborts on
//! `cancel_requested`, an `Arc<AtomicBool>` set from a ctrlc handler — see
//! `engine::tools::setup_ctrlc_handler`/`check_for_cancel`). `CancellationToken` here generalizes
//! that same pattern; `PauseGate` is new, modeled as a `Condvar`-backed manually-resettable event
//! since the spec requires workers to block (not just check-and-continue) while paused.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{EngineError, Result};

/// One-way cancellation signal observed by every worker loop.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if cancellation has been requested; otherwise `Ok(())`. Call at
    /// every suspension point named in spec §5 (directory pop, candidate emission, hash buffer
    /// fill, copy-chunk boundary).
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Manually-settable, re-openable signal that blocks workers at safe points while paused.
/// Initially open.
#[derive(Clone)]
pub struct PauseGate {
    paused: Arc<(Mutex<bool>, Condvar)>,
}

impl Default for PauseGate {
    fn default() -> Self {
        PauseGate {
            paused: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        let (lock, cvar) = &*self.paused;
        *lock.lock().expect("pause gate mutex poisoned") = true;
        cvar.notify_all();
    }

    pub fn resume(&self) {
        let (lock, cvar) = &*self.paused;
        *lock.lock().expect("pause gate mutex poisoned") = false;
        cvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.0.lock().expect("pause gate mutex poisoned")
    }

    /// Block the calling thread while the gate is closed (paused). Returns immediately if open.
    pub fn wait_while_paused(&self) {
        let (lock, cvar) = &*self.paused;
        let guard = lock.lock().expect("pause gate mutex poisoned");
        let _unused = cvar
            .wait_while(guard, |paused| *paused)
            .expect("pause gate mutex poisoned");
    }
}

/// Host capability for preventing system sleep. A no-op implementation is valid on platforms
/// without one; the reference-counting behavior below still functions either way.
pub trait SleepInhibitor: Send + Sync {
    fn inhibit(&self);
    fn allow(&self);
}

/// A platform sleep inhibitor that does nothing — used when no host capability is wired in.
pub struct NoopSleepInhibitor;

impl SleepInhibitor for NoopSleepInhibitor {
    fn inhibit(&self) {}
    fn allow(&self) {}
}

/// Reference-counted lease over a [`SleepInhibitor`], keyed by stage name ("Scan", "Hash",
/// "Copy", "Verification" per spec §4.7). The platform call fires on the 0→1 transition and
/// releases on the 1→0 transition.
pub struct SleepInhibitLeaseHolder {
    inhibitor: Arc<dyn SleepInhibitor>,
    count: AtomicUsize,
}

impl SleepInhibitLeaseHolder {
    pub fn new(inhibitor: Arc<dyn SleepInhibitor>) -> Self {
        SleepInhibitLeaseHolder {
            inhibitor,
            count: AtomicUsize::new(0),
        }
    }

    pub fn acquire(self: &Arc<Self>) -> SleepInhibitLease {
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inhibitor.inhibit();
        }
        SleepInhibitLease {
            holder: Arc::clone(self),
        }
    }
}

/// RAII lease: dropping it releases one reference, calling `allow()` when the count hits zero.
pub struct SleepInhibitLease {
    holder: Arc<SleepInhibitLeaseHolder>,
}

impl Drop for SleepInhibitLease {
    fn drop(&mut self) {
        if self.holder.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.holder.inhibitor.allow();
        }
    }
}
