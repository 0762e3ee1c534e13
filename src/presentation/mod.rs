//! Presentation layer with display slot implementations.

/// Headless display slot.
pub mod slot;

pub use slot::HeadlessSlot;
