//! Per-conversation run leases.
//!
//! At most one run may be active per conversation key. The lease is held
//! by a guard and released on drop, so every exit path (completion,
//! error, cancellation, panic unwind) gives the key back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use windlass_core::{Error, IgnoreLock, Result, RunId};

/// Tracks which conversation keys currently have an active run.
#[derive(Default, Clone)]
pub struct LeaseRegistry {
    active: Arc<Mutex<HashMap<String, RunId>>>,
}

impl LeaseRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lease for a key, failing fast if another run holds it.
    ///
    /// # Errors
    /// Returns [`Error::LeaseHeld`] when the key is already leased.
    pub fn acquire(&self, key: &str, run: RunId) -> Result<LeaseGuard> {
        let mut active = self.active.lock_ignore_poison();
        if active.contains_key(key) {
            return Err(Error::LeaseHeld(key.to_owned()));
        }
        active.insert(key.to_owned(), run);
        drop(active);

        debug!("Run {run} acquired lease for '{key}'");
        Ok(LeaseGuard {
            registry: Arc::clone(&self.active),
            key: key.to_owned(),
        })
    }

    /// The run currently holding the lease for a key, if any.
    pub fn holder(&self, key: &str) -> Option<RunId> {
        let active = self.active.lock_ignore_poison();
        active.get(key).copied()
    }
}

/// Releases the lease when dropped.
#[derive(Debug)]
pub struct LeaseGuard {
    registry: Arc<Mutex<HashMap<String, RunId>>>,
    key: String,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut active = self.registry.lock_ignore_poison();
        active.remove(&self.key);
        drop(active);
        debug!("Lease for '{}' released", self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let registry = LeaseRegistry::new();
        let first = RunId::new();

        let guard = registry.acquire("conv-1", first).unwrap();
        assert_eq!(registry.holder("conv-1"), Some(first));

        let error = registry.acquire("conv-1", RunId::new()).unwrap_err();
        assert!(matches!(error, Error::LeaseHeld(key) if key == "conv-1"));
        drop(guard);
    }

    #[test]
    fn test_drop_releases_the_key() {
        let registry = LeaseRegistry::new();
        let guard = registry.acquire("conv-1", RunId::new()).unwrap();
        drop(guard);

        assert_eq!(registry.holder("conv-1"), None);
        let reacquired = registry.acquire("conv-1", RunId::new());
        assert!(reacquired.is_ok());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = LeaseRegistry::new();
        let _first = registry.acquire("conv-1", RunId::new()).unwrap();
        let second = registry.acquire("conv-2", RunId::new());
        assert!(second.is_ok());
    }
}
