//! Application state transition table (spec §4.7). Transitions not listed here are rejected
//! with no state change; the state is persisted after every successful transition.

use crate::types::AppState;

/// True if moving from `from` to `to` is a legal transition.
pub fn is_allowed(from: AppState, to: AppState) -> bool {
    use AppState::*;
    matches!(
        (from, to),
        (Idle, Scanning)
            | (Idle, Hashing)
            | (Idle, Planning)
            | (Idle, ReadyToCopy)
            | (Idle, Copying)
            | (Scanning, ScanPaused)
            | (Scanning, Hashing)
            | (Scanning, Idle)
            | (Scanning, Faulted)
            | (ScanPaused, Scanning)
            | (ScanPaused, Idle)
            | (Hashing, HashPaused)
            | (Hashing, Planning)
            | (Hashing, Idle)
            | (Hashing, Faulted)
            | (HashPaused, Hashing)
            | (HashPaused, Idle)
            | (Planning, ReadyToCopy)
            | (Planning, Idle)
            | (ReadyToCopy, Copying)
            | (ReadyToCopy, Planning)
            | (ReadyToCopy, Idle)
            | (Copying, CopyPaused)
            | (Copying, Completed)
            | (Copying, Idle)
            | (Copying, Faulted)
            | (CopyPaused, Copying)
            | (CopyPaused, Idle)
            | (Completed, Idle)
            | (Faulted, Idle)
    )
}

/// Error returned when a caller requests an illegal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: AppState,
    pub to: AppState,
}

impl std::fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal state transition: {} -> {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for IllegalTransition {}

pub fn validate(from: AppState, to: AppState) -> Result<(), IllegalTransition> {
    if is_allowed(from, to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_documented_transitions() {
        assert!(is_allowed(AppState::Idle, AppState::Scanning));
        assert!(is_allowed(AppState::Scanning, AppState::ScanPaused));
        assert!(is_allowed(AppState::Copying, AppState::Completed));
        assert!(is_allowed(AppState::Faulted, AppState::Idle));
    }

    #[test]
    fn rejects_undocumented_transitions() {
        assert!(!is_allowed(AppState::Idle, AppState::Completed));
        assert!(!is_allowed(AppState::Scanning, AppState::Copying));
        assert!(!is_allowed(AppState::Completed, AppState::Scanning));
        assert!(!is_allowed(AppState::ScanPaused, AppState::Hashing));
    }
}
