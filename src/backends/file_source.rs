// SPDX-License-Identifier: GPL-3.0-only

//! Still images as camera frames
//!
//! Used by the `decode` command to push image files through the same
//! analysis path as live frames.

use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame, SensorRotation};
use crate::constants::file_formats;
use crate::frame_processor::{FrameHandle, FrameRelease};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, "Image loaded");

    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

/// Expand `inputs` into image files
///
/// Directories contribute their image files (not recursive, sorted by
/// name). Files are kept as given even with an unknown extension so that
/// the loader reports the actual error.
pub fn collect_images(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            images.push(input.clone());
            continue;
        }

        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input) {
            Ok(entries) => entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.extension()
                        .and_then(|e| e.to_str())
                        .map(file_formats::is_image_extension)
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                warn!(path = %input.display(), error = %e, "Failed to read directory");
                continue;
            }
        };
        entries.sort();
        images.extend(entries);
    }

    images
}

/// Produces frame handles from image files
///
/// A file that fails to load becomes a frame without image data, the same
/// shape a camera delivers for an unreadable buffer.
pub struct FileFrameSource {
    paths: Vec<PathBuf>,
    rotation: SensorRotation,
    releaser: Arc<dyn FrameRelease>,
    next: usize,
}

impl FileFrameSource {
    pub fn new(paths: Vec<PathBuf>, rotation: SensorRotation, releaser: Arc<dyn FrameRelease>) -> Self {
        Self {
            paths,
            rotation,
            releaser,
            next: 0,
        }
    }
}

impl Iterator for FileFrameSource {
    type Item = (PathBuf, FrameHandle);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?.clone();
        let sequence = self.next as u64;
        self.next += 1;

        let image = match load_image_as_frame(&path) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image could not be loaded");
                None
            }
        };

        let handle = FrameHandle::new(image, self.rotation, sequence, Some(Arc::clone(&self.releaser)));
        Some((path, handle))
    }
}
