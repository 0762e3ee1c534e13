//! Domain types for image handling.

use std::path::{Path, PathBuf};

/// Cache and binding key for a decoded image.
/// For files on disk this is the absolute path of the file.
///
/// Keys compare byte for byte, so `A.png` and `a.png` are different images.
/// On case-insensitive file systems canonicalise paths before binding them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey(String);

impl ImageKey {
    /// Creates a new `ImageKey` from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates the key for a file on disk.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    /// Creates a key from a URL by hashing it.
    #[must_use]
    pub fn hashed(url: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Path> for ImageKey {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

/// Target display size of a slot in pixels.
/// A zero dimension places no constraint on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ViewSize {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when neither axis is constrained.
    #[must_use]
    pub const fn is_unconstrained(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Clockwise rotation applied after decoding, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees clockwise.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees clockwise.
    ThreeQuarters,
}

impl Rotation {
    /// Converts degrees to the nearest quarter turn.
    /// Negative values rotate counter-clockwise.
    #[must_use]
    pub const fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            1 => Self::Quarter,
            2 => Self::Half,
            3 => Self::ThreeQuarters,
            _ => Self::None,
        }
    }

    /// Returns the rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarters => 270,
        }
    }

    /// Returns true if no rotation is requested.
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Image shown while a remote image is downloading, and after it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// An asset bundled with the application, looked up by name.
    Bundle(String),
    /// A local image file.
    File(PathBuf),
}

impl Placeholder {
    /// Creates a bundled-asset placeholder.
    #[must_use]
    pub fn bundle(name: impl Into<String>) -> Self {
        Self::Bundle(name.into())
    }

    /// Creates a file placeholder.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

/// Where a loaded image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the in-memory LRU cache.
    MemoryCache,
    /// Decoded from a local file.
    Decoded,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::Decoded => write!(f, "decoded"),
        }
    }
}
