//! File descriptor limit detection for capping concurrent operations (Unix), ported from the
//! teacher's `utils::fd_limit`. The enumerator holds one handle per open directory and the copy
//! executor holds source + temp-destination handles per in-flight job, so both stages cap their
//! worker counts against this before handing them to the stage runners.

/// Estimated number of file descriptors used per worker (walk dir handles, or source+temp file
/// handles for a copy worker).
pub const FDS_PER_WORKER: usize = 10;

/// Fraction of the process FD limit to use, leaving headroom for the store's own connections and
/// whatever else the process has open.
const FD_LIMIT_FRACTION: f64 = 0.8;

#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Suggested max worker count so the process stays under ~80% of its FD limit. `None` if no
/// limit is available (caller keeps its own default).
pub fn max_workers_by_fd_limit() -> Option<usize> {
    let limit = max_open_fds()?;
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    if usable < FDS_PER_WORKER {
        return Some(1);
    }
    Some(usable / FDS_PER_WORKER)
}

/// Cap `requested` workers by the FD-limit-derived ceiling, never going below 1.
pub fn cap_worker_count(requested: usize) -> usize {
    match max_workers_by_fd_limit() {
        Some(cap) => requested.min(cap).max(1),
        None => requested.max(1),
    }
}
