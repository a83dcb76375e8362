//! Per-note mutual exclusion.
//!
//! Mutations of the same note run one at a time; different notes never wait
//! on each other. Entries are dropped from the registry once nobody holds or
//! waits for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Registry = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// Registry of async mutexes keyed by note id.
#[derive(Clone, Default)]
pub struct NoteLocks {
    inner: Arc<Mutex<Registry>>,
}

impl NoteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds the lock for `id`.
    pub async fn acquire(&self, id: Uuid) -> NoteLockGuard {
        let lock = self.registry().entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        NoteLockGuard {
            guard: Some(guard),
            id,
            locks: self.clone(),
        }
    }

    /// Number of ids with a live lock entry.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    // Registry updates never panic midway, so a poisoned map is still consistent.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self, id: Uuid) {
        let mut registry = self.registry();
        if registry
            .get(&id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            registry.remove(&id);
        }
    }
}

/// Held for the duration of one note mutation.
pub struct NoteLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: Uuid,
    locks: NoteLocks,
}

impl Drop for NoteLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune(self.id);
    }
}
