//! Display slot identity.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a display slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Write-once identity cell embedded in every slot.
///
/// The id is assigned lazily, the first time the slot is handed to a loader,
/// from that loader's [`SlotIdAllocator`]. Once set it never changes, so a
/// recycled slot keeps its identity across rebinds.
#[derive(Debug, Default)]
pub struct SlotTag(OnceLock<SlotId>);

impl SlotTag {
    /// Creates an unassigned tag.
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Returns the id, assigning one from `ids` if the tag is still empty.
    pub fn get_or_assign(&self, ids: &SlotIdAllocator) -> SlotId {
        *self.0.get_or_init(|| ids.next())
    }

    /// Returns the id if one was assigned.
    #[must_use]
    pub fn get(&self) -> Option<SlotId> {
        self.0.get().copied()
    }
}

/// Monotonic id source owned by a loader context.
#[derive(Debug, Default)]
pub struct SlotIdAllocator {
    next: AtomicU64,
}

impl SlotIdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Hands out the next id.
    pub fn next(&self) -> SlotId {
        SlotId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
