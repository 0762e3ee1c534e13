//! Domain entity definitions.

mod image;
mod slot;
mod token;

pub use self::image::{ImageKey, ImageSource, Placeholder, Rotation, ViewSize};
pub use slot::{SlotId, SlotIdAllocator, SlotTag};
pub use token::AccessToken;
