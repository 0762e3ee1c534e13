//! Image handling infrastructure.
//!
//! This module provides:
//! - A generic LRU cache and its decoded-image specialisation
//! - Coalesced downloads into a storage folder
//! - Slot binding bookkeeping against view recycling
//! - Raster decoding with downsampling
//! - The loader facade tying these together

pub mod bindings;
pub mod decoder;
pub mod download;
pub mod loader;
pub mod lru_cache;
pub mod memory_cache;
#[cfg(test)]
pub mod mock;

pub use bindings::ViewBindingRegistry;
pub use decoder::{RasterPlatform, sample_divisor};
pub use download::{
    DEFAULT_MAX_CONCURRENT_DOWNLOADS, DownloadCoordinator, DownloadResult, StoredFile,
};
pub use loader::{
    DoneCallback, ErrorCallback, ImageLoader, ImageLoaderConfig, LoaderPorts, SharedView,
    ViewRequest,
};
pub use lru_cache::LruCache;
pub use memory_cache::{CacheStats, DEFAULT_CACHE_SIZE, MIN_CACHE_SIZE, MemoryImageCache};
