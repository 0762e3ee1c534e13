//! Raster decoding platform built on the `image` crate.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::{debug, trace};

use crate::domain::entities::{Rotation, ViewSize};
use crate::domain::errors::LoadError;
use crate::domain::ports::{FileSystemPort, ImagePlatform};

/// Returns the largest power-of-two divisor that keeps the source at or
/// above `target` on every constrained axis.
///
/// A zero target dimension places no constraint on that axis; the divisor
/// then only keeps that axis from collapsing below one pixel. With both
/// dimensions zero the image is decoded at full size.
#[must_use]
pub fn sample_divisor(source: (u32, u32), target: ViewSize) -> u32 {
    if target.is_unconstrained() {
        return 1;
    }
    let (width, height) = source;
    let fits = |dim: u32, wanted: u32, divisor: u32| dim / divisor >= wanted.max(1);

    let mut divisor = 1u32;
    while let Some(next) = divisor.checked_mul(2) {
        if !(fits(width, target.width, next) && fits(height, target.height, next)) {
            break;
        }
        divisor = next;
    }
    divisor
}

/// [`ImagePlatform`] producing shared [`DynamicImage`] handles.
///
/// Bundled assets are looked up by name inside `bundle_dir`.
pub struct RasterPlatform {
    bundle_dir: PathBuf,
    file_system: Arc<dyn FileSystemPort>,
}

impl std::fmt::Debug for RasterPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterPlatform")
            .field("bundle_dir", &self.bundle_dir)
            .finish_non_exhaustive()
    }
}

impl RasterPlatform {
    /// Creates a platform reading files through `file_system`.
    #[must_use]
    pub fn new(bundle_dir: PathBuf, file_system: Arc<dyn FileSystemPort>) -> Self {
        Self {
            bundle_dir,
            file_system,
        }
    }

    /// Returns the folder bundled assets are read from.
    #[must_use]
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, LoadError> {
        if !self.file_system.file_exists(path) {
            return Err(LoadError::not_found(path.display().to_string()));
        }
        self.file_system
            .read_file(path)
            .map_err(|e| LoadError::decode(e.to_string()))
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, LoadError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::decode(format!("cannot detect format: {e}")))
}

fn decode(bytes: &[u8], target: ViewSize, rotation: Rotation) -> Result<DynamicImage, LoadError> {
    let (width, height) = reader(bytes)?
        .into_dimensions()
        .map_err(|e| LoadError::decode(format!("cannot read dimensions: {e}")))?;

    let divisor = sample_divisor((width, height), target);
    let mut image = reader(bytes)?
        .decode()
        .map_err(|e| LoadError::decode(e.to_string()))?;

    if divisor > 1 {
        image = image.resize_exact(width / divisor, height / divisor, FilterType::Triangle);
    }
    trace!(width, height, divisor, "Decoded image");

    Ok(match rotation {
        Rotation::None => image,
        Rotation::Quarter => image.rotate90(),
        Rotation::Half => image.rotate180(),
        Rotation::ThreeQuarters => image.rotate270(),
    })
}

impl ImagePlatform for RasterPlatform {
    type Image = Arc<DynamicImage>;

    fn decode_from_path(
        &self,
        path: &Path,
        target: ViewSize,
        rotation: Rotation,
    ) -> Result<Self::Image, LoadError> {
        let bytes = self.read(path)?;
        decode(&bytes, target, rotation)
            .map(Arc::new)
            .map_err(|e| match e {
                LoadError::DecodeFailure(msg) => {
                    LoadError::decode(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }

    fn decode_from_bundle(&self, name: &str) -> Result<Self::Image, LoadError> {
        let path = self.bundle_dir.join(name);
        let bytes = self.read(&path)?;
        debug!(name, "Decoding bundled asset");
        decode(&bytes, ViewSize::default(), Rotation::None).map(Arc::new)
    }

    fn release_image(&self, image: Self::Image) {
        trace!(
            width = image.width(),
            height = image.height(),
            shared = Arc::strong_count(&image) > 1,
            "Released image"
        );
    }
}
