//! Headless display slot.
//!
//! Holds the image a slot shows without drawing it. Used by the CLI and as
//! the reference [`ImageView`] for hosts wiring their own widgets.

use parking_lot::Mutex;

use crate::domain::entities::{SlotTag, ViewSize};
use crate::domain::ports::ImageView;

#[derive(Debug)]
struct SlotState<I> {
    visible: bool,
    content: Option<I>,
    changes: usize,
}

/// In-memory [`ImageView`] implementation.
#[derive(Debug)]
pub struct HeadlessSlot<I> {
    tag: SlotTag,
    size: Mutex<ViewSize>,
    state: Mutex<SlotState<I>>,
}

impl<I: Clone> HeadlessSlot<I> {
    /// Creates a visible, empty slot of the given size.
    #[must_use]
    pub fn new(size: ViewSize) -> Self {
        Self {
            tag: SlotTag::new(),
            size: Mutex::new(size),
            state: Mutex::new(SlotState {
                visible: true,
                content: None,
                changes: 0,
            }),
        }
    }

    /// Returns the image currently shown.
    #[must_use]
    pub fn content(&self) -> Option<I> {
        self.state.lock().content.clone()
    }

    /// Returns how many times the content was replaced or cleared.
    #[must_use]
    pub fn content_changes(&self) -> usize {
        self.state.lock().changes
    }

    /// Resizes the slot; later loads decode towards the new size.
    pub fn resize(&self, size: ViewSize) {
        *self.size.lock() = size;
    }
}

impl<I: Clone + Send + Sync> ImageView<I> for HeadlessSlot<I> {
    fn tag(&self) -> &SlotTag {
        &self.tag
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn set_visible(&self, visible: bool) {
        self.state.lock().visible = visible;
    }

    fn size(&self) -> ViewSize {
        *self.size.lock()
    }

    fn has_content(&self) -> bool {
        self.state.lock().content.is_some()
    }

    fn set_content(&self, image: Option<I>) {
        let mut state = self.state.lock();
        state.content = image;
        state.changes += 1;
    }
}
