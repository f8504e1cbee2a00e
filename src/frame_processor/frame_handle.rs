// SPDX-License-Identifier: GPL-3.0-only

//! Single-use frame handles
//!
//! A [`FrameHandle`] owns one delivered frame and the obligation to give it
//! back to whoever produced it. Release happens exactly once: either through
//! [`FrameHandle::close`] or, if the handle is dropped on some other path,
//! from `Drop`. `close` consumes the handle, so a second release cannot be
//! written.

use crate::backends::camera::types::{CameraFrame, SensorRotation};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Receives the release notification of a frame
pub trait FrameRelease: Send + Sync {
    /// Called once per handle with the handle's sequence number
    fn release(&self, sequence: u64);
}

/// Release sink that just counts releases
#[derive(Debug, Default)]
pub struct ReleaseCounter {
    released: AtomicU64,
}

impl ReleaseCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total number of frames released so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

impl FrameRelease for ReleaseCounter {
    fn release(&self, _sequence: u64) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// One delivered camera frame plus its release obligation
pub struct FrameHandle {
    image: Option<CameraFrame>,
    rotation: SensorRotation,
    sequence: u64,
    releaser: Option<Arc<dyn FrameRelease>>,
}

impl FrameHandle {
    /// Wrap a frame. `image` is `None` when the producer had a slot but no pixels.
    pub fn new(
        image: Option<CameraFrame>,
        rotation: SensorRotation,
        sequence: u64,
        releaser: Option<Arc<dyn FrameRelease>>,
    ) -> Self {
        Self {
            image,
            rotation,
            sequence,
            releaser,
        }
    }

    /// Frame pixels, if any were delivered
    pub fn image(&self) -> Option<&CameraFrame> {
        self.image.as_ref()
    }

    /// Rotation to apply before decoding
    pub fn rotation(&self) -> SensorRotation {
        self.rotation
    }

    /// Producer-assigned sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Release the frame back to its producer
    pub fn close(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        // Drop the pixels first so a mapped buffer returns to its pool
        self.image = None;
        if let Some(releaser) = self.releaser.take() {
            trace!(sequence = self.sequence, "Releasing frame");
            releaser.release(self.sequence);
        }
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("sequence", &self.sequence)
            .field("rotation", &self.rotation)
            .field("has_image", &self.image.is_some())
            .field("released", &self.releaser.is_none())
            .finish()
    }
}
