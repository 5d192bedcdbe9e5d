//! Get-or-create memo cache with shared in-flight computations.
//!
//! Each key maps to a single shared future. The first caller for a key
//! creates it; every later caller awaits a clone of the same future, so
//! concurrent requests for one key never trigger duplicate work. A resolved
//! entry is never replaced in place: [`MemoCache::invalidate`] drops it and
//! the next caller starts a fresh computation.
//!
//! Failures are not memoized. When a computation resolves to an error, the
//! entry it created is evicted (unless it was already replaced).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::HistoryError;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, HistoryError>>>;

struct Slot<V> {
    generation: u64,
    value: SharedResult<V>,
}

/// Memo cache keyed by `K`, holding pending-or-resolved `V`s.
pub struct MemoCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    generation: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, starting `init` if no entry exists.
    ///
    /// `init` is only called when this caller creates the entry.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: K, init: F) -> Result<V, HistoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, HistoryError>> + Send + 'static,
    {
        let (generation, pending) = {
            let mut slots = self.lock();
            match slots.get(&key) {
                Some(slot) => (slot.generation, slot.value.clone()),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let value = init().boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot {
                            generation,
                            value: value.clone(),
                        },
                    );
                    (generation, value)
                }
            }
        };

        let result = pending.await;
        if result.is_err() {
            let mut slots = self.lock();
            if slots.get(&key).is_some_and(|s| s.generation == generation) {
                slots.remove(&key);
                tracing::debug!(generation, "evicted failed memo entry");
            }
        }
        result
    }

    /// Return the value for `key` if its computation already succeeded.
    pub fn peek(&self, key: &K) -> Option<V> {
        let slots = self.lock();
        match slots.get(key)?.value.peek()? {
            Ok(v) => Some(v.clone()),
            Err(_) => None,
        }
    }

    /// Returns `true` if an entry (pending or resolved) exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    /// Drop the entry for `key`. Returns `true` if one existed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
