//! Registry of the image each display slot last asked for.
//!
//! Slots get recycled: a slot can be rebound to another image while an
//! earlier load for it is still running. Every completion checks
//! [`ViewBindingRegistry::is_current`] right before touching the slot and is
//! dropped when a newer request has taken over.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::{ImageKey, SlotId};

/// Maps each slot to its most recently requested image key.
#[derive(Debug, Default)]
pub struct ViewBindingRegistry {
    bindings: Mutex<HashMap<SlotId, ImageKey>>,
}

impl ViewBindingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as current for `slot`.
    /// Returns true if it differs from what the slot was bound to.
    pub fn register(&self, slot: SlotId, key: &ImageKey) -> bool {
        let mut bindings = self.bindings.lock();
        let previous = bindings.insert(slot, key.clone());
        let changed = previous.as_ref() != Some(key);
        trace!(slot = %slot, key = %key, changed, "Registered slot binding");
        changed
    }

    /// Clears the binding of `slot`.
    pub fn unregister(&self, slot: SlotId) {
        if self.bindings.lock().remove(&slot).is_some() {
            trace!(slot = %slot, "Unregistered slot binding");
        }
    }

    /// Clears every binding to `key` and returns the affected slots.
    pub fn unregister_key(&self, key: &ImageKey) -> Vec<SlotId> {
        let mut bindings = self.bindings.lock();
        let mut slots: Vec<SlotId> = bindings
            .iter()
            .filter(|(_, bound)| *bound == key)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &slots {
            bindings.remove(slot);
        }
        slots.sort_unstable();
        slots
    }

    /// Returns true if `slot` is still bound to exactly `key`.
    /// An unbound slot matches nothing.
    pub fn is_current(&self, slot: SlotId, key: &ImageKey) -> bool {
        self.bindings.lock().get(&slot) == Some(key)
    }

    /// Returns the key `slot` is bound to.
    pub fn current(&self, slot: SlotId) -> Option<ImageKey> {
        self.bindings.lock().get(&slot).cloned()
    }

    /// Returns the number of bound slots.
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Returns true if no slot is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears every binding.
    pub fn clear(&self) {
        self.bindings.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u64) -> SlotId {
        SlotId::new(id)
    }

    #[test]
    fn test_register_reports_change() {
        let registry = ViewBindingRegistry::new();
        let a = ImageKey::new("/a.png");
        let b = ImageKey::new("/b.png");

        assert!(registry.register(slot(1), &a));
        assert!(!registry.register(slot(1), &a));
        assert!(registry.register(slot(1), &b));
        assert_eq!(registry.current(slot(1)), Some(b));
    }

    #[test]
    fn test_is_current_tracks_latest_request() {
        let registry = ViewBindingRegistry::new();
        let a = ImageKey::new("/a.png");
        let b = ImageKey::new("/b.png");

        registry.register(slot(1), &a);
        registry.register(slot(1), &b);

        assert!(!registry.is_current(slot(1), &a));
        assert!(registry.is_current(slot(1), &b));
    }

    #[test]
    fn test_keys_differing_in_case_are_distinct() {
        let registry = ViewBindingRegistry::new();
        let lower = ImageKey::new("/pics/a.png");
        let upper = ImageKey::new("/pics/A.png");

        registry.register(slot(1), &lower);
        assert!(!registry.is_current(slot(1), &upper));
        assert!(registry.register(slot(1), &upper));
        assert!(registry.unregister_key(&lower).is_empty());
    }

    #[test]
    fn test_unbound_slot_is_never_current() {
        let registry = ViewBindingRegistry::new();
        let a = ImageKey::new("/a.png");

        assert!(!registry.is_current(slot(1), &a));
        registry.register(slot(1), &a);
        registry.unregister(slot(1));
        assert!(!registry.is_current(slot(1), &a));
        assert!(registry.register(slot(1), &a));
    }

    #[test]
    fn test_unregister_key_only_touches_matching_slots() {
        let registry = ViewBindingRegistry::new();
        let a = ImageKey::new("/a.png");
        let b = ImageKey::new("/b.png");

        registry.register(slot(3), &a);
        registry.register(slot(1), &a);
        registry.register(slot(2), &b);

        assert_eq!(registry.unregister_key(&a), vec![slot(1), slot(3)]);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_current(slot(2), &b));
    }
}
