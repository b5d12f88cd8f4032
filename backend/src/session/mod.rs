//! Single-flight guard: at most one report pipeline per session.
//!
//! ```rust,ignore
//! let guards = SessionGuards::new();
//! let _guard = guards.try_acquire("browser-tab-1").ok_or(PipelineError::Busy(..))?;
//! // ... run the pipeline; the slot is released when `_guard` drops,
//! // on success, on error and on unwind alike.
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Sessions with a pipeline in flight.
#[derive(Debug, Clone, Default)]
pub struct SessionGuards {
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the session's slot, or `None` if a pipeline is already running.
    pub fn try_acquire(&self, session: &str) -> Option<FetchGuard> {
        let mut active = self.lock();
        if !active.insert(session.to_string()) {
            return None;
        }
        Some(FetchGuard {
            session: session.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_busy(&self, session: &str) -> bool {
        self.lock().contains(session)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held for the duration of one pipeline run; releases the slot on drop.
#[derive(Debug)]
pub struct FetchGuard {
    session: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl FetchGuard {
    pub fn session(&self) -> &str {
        &self.session
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let guards = SessionGuards::new();
        let guard = guards.try_acquire("a").unwrap();
        assert_eq!(guard.session(), "a");
        assert!(guards.try_acquire("a").is_none());
        assert!(guards.is_busy("a"));
    }

    #[test]
    fn test_sessions_are_independent() {
        let guards = SessionGuards::new();
        let _a = guards.try_acquire("a").unwrap();
        assert!(guards.try_acquire("b").is_some());
    }

    #[test]
    fn test_released_on_drop() {
        let guards = SessionGuards::new();
        {
            let _guard = guards.try_acquire("a").unwrap();
        }
        assert!(!guards.is_busy("a"));
        assert!(guards.try_acquire("a").is_some());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing_run(guards: &SessionGuards) -> Result<(), String> {
            let _guard = guards.try_acquire("a").ok_or("busy")?;
            Err("upstream down".to_string())
        }

        let guards = SessionGuards::new();
        assert!(failing_run(&guards).is_err());
        assert!(!guards.is_busy("a"));
    }

    #[test]
    fn test_released_on_panic() {
        let guards = SessionGuards::new();
        let cloned = guards.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.try_acquire("a").unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!guards.is_busy("a"));
    }
}
