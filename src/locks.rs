//! Named advisory locks.
//!
//! Two concurrent operations against the same underlying resource (say,
//! an update and a delete racing for one VM) must not interleave their
//! control-plane call sequences. The registry hands out async mutexes
//! keyed by name; a guard is held for the duration of each mutating
//! operation and released on drop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide registry of named async mutexes.
///
/// Lock entries are created on first use and kept for the lifetime of
/// the registry; the set of names in play is small (one per managed
/// resource name).
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// A held named lock. Dropping it releases the name.
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `name`, waiting if another operation holds
    /// it.
    pub async fn lock(&self, name: &str) -> LockGuard {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        LockGuard {
            _guard: mutex.lock_owned().await,
        }
    }
}
