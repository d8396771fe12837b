//! Mutex-guarded containers shared between the manager tick and job tasks
//!
//! Each operation holds the lock only for its own duration. A poisoned lock
//! is recovered, since no operation leaves the container half-updated.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// FIFO queue safe to share across threads
#[derive(Debug)]
pub struct BlockingQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        lock(&self.inner).push_back(item);
    }

    /// Pops the front item, `None` when the queue is empty
    pub fn try_pop(&self) -> Option<T> {
        lock(&self.inner).pop_front()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn clear(&self) {
        lock(&self.inner).clear();
    }
}

/// Hash map safe to share across threads
#[derive(Debug)]
pub struct BlockingMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for BlockingMap<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V> BlockingMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value under `key`
    pub fn insert(&self, key: K, value: V) {
        lock(&self.inner).insert(key, value);
    }

    /// Replaces the value under `key` only when the key is present
    ///
    /// Returns whether a replacement happened.
    pub fn find_and_replace(&self, key: &K, value: V) -> bool {
        match lock(&self.inner).get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Inserts only when `key` is absent, returning whether it was inserted
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut map = lock(&self.inner);
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.inner).contains_key(key)
    }

    pub fn erase(&self, key: &K) -> Option<V> {
        lock(&self.inner).remove(key)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> BlockingMap<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        lock(&self.inner).get(key).cloned()
    }

    /// Point-in-time snapshot of the keys
    pub fn keys(&self) -> Vec<K> {
        lock(&self.inner).keys().cloned().collect()
    }

    /// Point-in-time snapshot of the values
    pub fn values(&self) -> Vec<V> {
        lock(&self.inner).values().cloned().collect()
    }
}
