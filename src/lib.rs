//! Pictor - image loading with bounded caching and download coalescing.
//!
//! Images are bound to display slots from local files or remote URIs.
//! Decoded images live in a bounded LRU cache, concurrent downloads of the
//! same source share one fetch, and results that arrive for a slot that has
//! since been rebound are discarded.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters and the image pipeline.
pub mod infrastructure;
/// Presentation layer containing display slot implementations.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "pictor";
