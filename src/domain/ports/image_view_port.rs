//! Display slot and image platform ports.

use std::path::Path;

use crate::domain::entities::{Rotation, SlotTag, ViewSize};
use crate::domain::errors::LoadError;

/// Capability interface of a display slot.
///
/// A slot shows one image at a time. It is only mutated from the UI
/// context; the loader marshals every mutation through a
/// [`UiDispatcher`](super::UiDispatcher).
pub trait ImageView<I>: Send + Sync {
    /// Identity cell of this slot.
    fn tag(&self) -> &SlotTag;

    /// Returns whether the slot is visible.
    fn is_visible(&self) -> bool;

    /// Shows or hides the slot.
    fn set_visible(&self, visible: bool);

    /// Current display size, used as the decode target.
    fn size(&self) -> ViewSize;

    /// Returns whether the slot currently shows an image.
    fn has_content(&self) -> bool;

    /// Replaces the shown image. `None` clears the slot.
    fn set_content(&self, image: Option<I>);
}

/// Platform that produces and releases decoded image handles.
pub trait ImagePlatform: Send + Sync + 'static {
    /// Decoded image handle. Clones must refer to the same image.
    type Image: Clone + Send + Sync + 'static;

    /// Decodes a local file, downsampled towards `target` and rotated.
    ///
    /// # Errors
    /// Returns [`LoadError::DecodeFailure`] for unreadable or corrupt data.
    fn decode_from_path(
        &self,
        path: &Path,
        target: ViewSize,
        rotation: Rotation,
    ) -> Result<Self::Image, LoadError>;

    /// Decodes an asset bundled with the application.
    ///
    /// # Errors
    /// Returns error if the asset is missing or cannot be decoded.
    fn decode_from_bundle(&self, name: &str) -> Result<Self::Image, LoadError>;

    /// Frees the memory held by a handle that left the cache.
    fn release_image(&self, image: Self::Image);
}
