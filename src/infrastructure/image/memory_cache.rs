//! In-memory LRU image cache implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::lru_cache::LruCache;
use crate::domain::entities::ImageKey;
use crate::domain::ports::ImagePlatform;

/// Smallest capacity a memory cache accepts.
pub const MIN_CACHE_SIZE: usize = 10;

/// Default maximum number of images to cache in memory.
pub const DEFAULT_CACHE_SIZE: usize = MIN_CACHE_SIZE;

/// In-memory LRU cache for decoded images.
///
/// Owns its entries: anything that leaves the cache, through eviction,
/// invalidation or teardown, is released through the platform.
pub struct MemoryImageCache<P: ImagePlatform> {
    cache: LruCache<ImageKey, P::Image>,
    platform: Arc<P>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<P: ImagePlatform> MemoryImageCache<P> {
    /// Creates a new cache with the specified capacity, never below
    /// [`MIN_CACHE_SIZE`].
    #[must_use]
    pub fn new(capacity: usize, platform: Arc<P>) -> Self {
        Self {
            cache: LruCache::new(capacity.max(MIN_CACHE_SIZE)),
            platform,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Gets an image and promotes it in the LRU.
    pub fn get(&self, key: &ImageKey) -> Option<P::Image> {
        if let Some(img) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(img)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    /// Peeks at an image without promoting it in the LRU.
    pub fn peek(&self, key: &ImageKey) -> Option<P::Image> {
        self.cache.peek(key)
    }

    /// Stores a freshly decoded image and returns the handle callers should
    /// use from now on.
    ///
    /// If another decode of the same key won the race, the resident handle is
    /// returned and `image` is released instead.
    pub fn insert(&self, key: ImageKey, image: P::Image) -> P::Image {
        debug!(key = %key, "Storing image in memory cache");
        let (resident, displaced) = self.cache.get_or_put(key, image);
        self.release_all(displaced);
        resident
    }

    /// Removes an image from the cache and releases it.
    /// Returns true if the key was cached.
    pub fn evict(&self, key: &ImageKey) -> bool {
        if let Some(image) = self.cache.remove(key) {
            debug!(key = %key, "Evicted image from memory cache");
            self.platform.release_image(image);
            true
        } else {
            false
        }
    }

    /// Checks if an image is cached.
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.cache.contains(key)
    }

    /// Returns the current number of cached images.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Changes the capacity, never below [`MIN_CACHE_SIZE`]. Returns the
    /// capacity actually applied.
    pub fn set_capacity(&self, capacity: usize) -> usize {
        let capacity = capacity.max(MIN_CACHE_SIZE);
        self.cache.set_capacity(capacity);
        debug!(capacity, "Memory cache capacity changed");
        capacity
    }

    /// Releases every cached image.
    pub fn clear(&self) {
        let drained = self.cache.drain();
        let count = drained.len();
        for (_, image) in drained {
            self.platform.release_image(image);
        }
        debug!(count, "Cleared memory image cache");
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
            size: self.len(),
            capacity: self.capacity(),
        }
    }

    fn release_all(&self, images: Vec<P::Image>) {
        if images.is_empty() {
            return;
        }
        self.evictions
            .fetch_add(images.len() as u64, Ordering::Relaxed);
        for image in images {
            self.platform.release_image(image);
        }
    }
}

impl<P: ImagePlatform> std::fmt::Debug for MemoryImageCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of images released to make room.
    pub evictions: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Configured capacity.
    pub capacity: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {}/{} images, {:.1}% hit rate ({} hits, {} misses, {} evictions)",
            self.size, self.capacity, self.hit_rate, self.hits, self.misses, self.evictions
        )
    }
}
