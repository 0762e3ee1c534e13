//! Test doubles for the image pipeline.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use parking_lot::Mutex;

use crate::domain::entities::{Rotation, ViewSize};
use crate::domain::errors::LoadError;
use crate::domain::ports::ImagePlatform;

/// Decoded image stand-in that remembers how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeImage {
    pub name: String,
    pub target: ViewSize,
    pub rotation: Rotation,
}

impl FakeImage {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: ViewSize::default(),
            rotation: Rotation::None,
        }
    }
}

/// Platform that "decodes" a file into a [`FakeImage`] named after its stem.
///
/// Decodes of a path can be held back with [`FakePlatform::hold`] until the
/// returned sender fires, which lets tests order completions.
#[derive(Default)]
pub struct FakePlatform {
    decodes: AtomicUsize,
    released: Mutex<Vec<String>>,
    gates: Mutex<HashMap<PathBuf, mpsc::Receiver<()>>>,
    corrupt: Mutex<HashSet<PathBuf>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks the next decode of `path` until the sender is used or dropped.
    pub fn hold(&self, path: &Path) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates.lock().insert(path.to_path_buf(), rx);
        tx
    }

    /// Makes every decode of `path` fail.
    pub fn corrupt(&self, path: &Path) {
        self.corrupt.lock().insert(path.to_path_buf());
    }

    /// Number of held decodes that have not started yet.
    pub fn holds(&self) -> usize {
        self.gates.lock().len()
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }
}

impl ImagePlatform for FakePlatform {
    type Image = FakeImage;

    fn decode_from_path(
        &self,
        path: &Path,
        target: ViewSize,
        rotation: Rotation,
    ) -> Result<FakeImage, LoadError> {
        let gate = self.gates.lock().remove(path);
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.decodes.fetch_add(1, Ordering::SeqCst);

        if self.corrupt.lock().contains(path) || !path.exists() {
            return Err(LoadError::decode(format!(
                "cannot decode {}",
                path.display()
            )));
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FakeImage {
            name,
            target,
            rotation,
        })
    }

    fn decode_from_bundle(&self, name: &str) -> Result<FakeImage, LoadError> {
        if name.starts_with("missing") {
            return Err(LoadError::not_found(name));
        }
        Ok(FakeImage::named(&format!("bundle:{name}")))
    }

    fn release_image(&self, image: FakeImage) {
        self.released.lock().push(image.name);
    }
}
