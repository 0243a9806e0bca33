//! In-process time-to-live caches.
//!
//! Caches are owned by the client objects that use them (one per ledger connection or
//! per [`Markets`](crate::markets::Markets)), never process wide. Expired values are never
//! served; refreshing is the caller's job and is a full replace of the slot.

use fnv::FnvHashMap;
use parking_lot::{Mutex, RwLock};
use std::{hash::Hash, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Single cached value with a time-to-live.
#[derive(Debug)]
pub struct TtlCell<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T: Clone> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value if it has not yet expired.
    pub fn get(&self) -> Option<T> {
        self.slot
            .read()
            .as_ref()
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone())
    }

    /// Replace the cached value, restarting its time-to-live. Last writer wins.
    pub fn set(&self, value: T) {
        *self.slot.write() = Some(Entry::new(value, self.ttl));
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

/// Keyed cache where every key expires independently.
#[derive(Debug)]
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: Mutex<FnvHashMap<K, Entry<V>>>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key` if it has not yet expired. Expired entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.lock().insert(key, Entry::new(value, self.ttl));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
