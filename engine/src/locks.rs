//! Per-key async locks.
//!
//! Vote casting serializes on `(voter, election)`, reconciliation on the
//! election id, and casting vs. finalization on a per-election read/write
//! gate. Entries are created on first use and pruned once nobody holds or
//! waits on them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Map size above which idle entries are dropped on the next access.
const PRUNE_THRESHOLD: usize = 1024;

pub struct KeyedLocks<K, L = Mutex<()>> {
    entries: std::sync::Mutex<HashMap<K, Arc<L>>>,
}

/// Per-election read/write gate.
pub type KeyedGates<K> = KeyedLocks<K, RwLock<()>>;

impl<K, L> KeyedLocks<K, L>
where
    K: Eq + Hash,
    L: Default,
{
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, key: K) -> Arc<L> {
        // A poisoned map is still structurally valid; the guarded values are unit.
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.len() >= PRUNE_THRESHOLD {
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        entries.entry(key).or_default().clone()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, L> Default for KeyedLocks<K, L>
where
    K: Eq + Hash,
    L: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> KeyedLocks<K, Mutex<()>> {
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }
}

impl<K: Eq + Hash> KeyedLocks<K, RwLock<()>> {
    pub async fn read(&self, key: K) -> OwnedRwLockReadGuard<()> {
        self.handle(key).read_owned().await
    }

    pub async fn write(&self, key: K) -> OwnedRwLockWriteGuard<()> {
        self.handle(key).write_owned().await
    }
}
