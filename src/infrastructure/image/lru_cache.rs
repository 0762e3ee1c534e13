//! Thread-safe LRU cache with caller-managed eviction.
//!
//! Evicted values are handed back to the caller instead of being dropped, so
//! values that own resources outside the Rust heap can be released explicitly.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use parking_lot::Mutex;

/// Fixed-capacity key-value cache with least-recently-used eviction.
///
/// Recency is kept by `lru::LruCache` (hash map plus doubly linked list) in
/// unbounded mode; capacity is enforced here so that shrinking it never drops
/// values behind the caller's back. Every operation takes the same mutex.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    entries: lru::LruCache<K, V>,
    capacity: NonZeroUsize,
}

impl<K: Hash + Eq, V> Inner<K, V> {
    fn evict_overflow(&mut self, out: &mut Vec<V>) {
        while self.entries.len() > self.capacity.get() {
            match self.entries.pop_lru() {
                Some((_, value)) => out.push(value),
                None => break,
            }
        }
    }
}

impl<K: Hash + Eq, V: Clone> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: lru::LruCache::unbounded(),
                capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            }),
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Returns the value for `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.peek(key).cloned()
    }

    /// Inserts `value` as most recently used.
    ///
    /// Returns every value that left the cache because of this call: the
    /// previous value stored under `key`, followed by least-recently-used
    /// entries evicted to get back within capacity.
    pub fn put(&self, key: K, value: V) -> Vec<V> {
        let mut inner = self.inner.lock();
        let mut displaced = Vec::new();
        if let Some(previous) = inner.entries.put(key, value) {
            displaced.push(previous);
        }
        inner.evict_overflow(&mut displaced);
        displaced
    }

    /// Returns the resident value for `key`, inserting `value` if absent.
    ///
    /// When `key` is already cached it is promoted and `value` is handed
    /// back in the second element instead of replacing the resident one.
    /// Otherwise the second element holds any evicted entries.
    pub fn get_or_put(&self, key: K, value: V) -> (V, Vec<V>) {
        let mut inner = self.inner.lock();
        if let Some(resident) = inner.entries.get(&key) {
            return (resident.clone(), vec![value]);
        }
        inner.entries.put(key, value.clone());
        let mut evicted = Vec::new();
        inner.evict_overflow(&mut evicted);
        (value, evicted)
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.pop(key)
    }

    /// Checks if `key` is cached without touching its recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.contains(key)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity.get()
    }

    /// Changes the capacity. Entries above a smaller capacity stay until
    /// later inserts push them out.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.lock().capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    }

    /// Removes every entry, least recently used first.
    pub fn drain(&self) -> Vec<(K, V)> {
        let mut inner = self.inner.lock();
        let mut drained = Vec::with_capacity(inner.entries.len());
        while let Some(entry) = inner.entries.pop_lru() {
            drained.push(entry);
        }
        drained
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruCache")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}
