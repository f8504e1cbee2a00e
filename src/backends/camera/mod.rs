// SPDX-License-Identifier: GPL-3.0-only

//! Camera binding
//!
//! ```text
//! ┌──────────────────┐
//! │  ScanSession     │
//! └────────┬─────────┘
//!          │ bind()
//!          ▼
//! ┌──────────────────┐     ┌────────────────────┐
//! │  CameraBinding   │────►│  ZoomActor         │ ← V4L2 ZOOM_ABSOLUTE
//! │                  │     └────────────────────┘   or digital crop
//! │  CameraPipeline  │────► LatestFrameSlot ─► analysis
//! └──────────────────┘────► preview channel
//! ```

pub mod enumeration;
pub mod pipeline;
pub mod types;
pub mod v4l2_controls;
pub mod zoom;

pub use enumeration::{enumerate_cameras, select_camera};
pub use pipeline::{AnalysisConfig, CameraPipeline};
pub use types::*;
pub use zoom::{DigitalZoomView, ZoomBackend, ZoomControl, ZoomHandle};

use crate::frame_processor::LatestFrameSlot;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything needed to bind a camera
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    pub analysis: AnalysisConfig,
    pub zoom: ZoomBackend,
}

/// A bound camera: running pipeline, analysis slot and zoom control
pub struct CameraBinding {
    device: CameraDevice,
    pipeline: CameraPipeline,
    slot: Arc<LatestFrameSlot>,
    zoom: ZoomHandle,
    zoom_task: JoinHandle<()>,
    digital_view: Option<DigitalZoomView>,
}

/// A camera that is bound and streaming
///
/// The scan session only talks to the camera through this trait:
/// - Frames for analysis come out of [`slot`](Self::slot)
/// - Zoom is driven through [`zoom`](Self::zoom)
/// - [`shutdown`](Self::shutdown) stops capture and closes the slot
pub trait ActiveCamera {
    fn device(&self) -> &CameraDevice;

    /// Frames waiting for analysis
    fn slot(&self) -> Arc<LatestFrameSlot>;

    fn zoom(&self) -> ZoomHandle;

    /// Present when the preview must crop to show the zoom
    fn digital_view(&self) -> Option<DigitalZoomView>;

    fn frames_captured(&self) -> u64;

    /// Stop capture and close the analysis slot
    fn shutdown(self) -> BackendResult<()>;
}

/// Opens a camera once access has been granted
pub trait CameraBinder {
    type Camera: ActiveCamera;

    fn bind(
        &self,
        selector: &CameraSelector,
        options: &BindOptions,
        preview: Option<FrameSender>,
    ) -> BackendResult<Self::Camera>;
}

/// GStreamer capture with V4L2 or digital zoom
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCamera;

impl CameraBinder for SystemCamera {
    type Camera = CameraBinding;

    fn bind(
        &self,
        selector: &CameraSelector,
        options: &BindOptions,
        preview: Option<FrameSender>,
    ) -> BackendResult<CameraBinding> {
        bind(selector, options, preview)
    }
}

impl ActiveCamera for CameraBinding {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn slot(&self) -> Arc<LatestFrameSlot> {
        Arc::clone(&self.slot)
    }

    fn zoom(&self) -> ZoomHandle {
        self.zoom.clone()
    }

    fn digital_view(&self) -> Option<DigitalZoomView> {
        self.digital_view.clone()
    }

    fn frames_captured(&self) -> u64 {
        self.pipeline.frames_captured()
    }

    /// The zoom actor keeps running until every handle is dropped.
    fn shutdown(self) -> BackendResult<()> {
        self.slot.close();
        let frames = self.pipeline.frames_captured();
        let released = self.pipeline.ledger().released();
        self.pipeline.stop()?;
        info!(
            device = %self.device.path,
            frames,
            released,
            dropped = self.slot.dropped(),
            "Camera unbound"
        );
        drop(self.zoom);
        drop(self.zoom_task);
        Ok(())
    }
}

/// Bind the selected camera
///
/// Must be called inside a tokio runtime; the zoom actor is spawned here.
pub fn bind(
    selector: &CameraSelector,
    options: &BindOptions,
    preview: Option<FrameSender>,
) -> BackendResult<CameraBinding> {
    let cameras = enumerate_cameras();
    let device = select_camera(&cameras, selector)?;
    info!(device = %device.name, path = %device.path, "Binding camera");

    let (control, digital_view) = zoom::open_zoom(options.zoom, &device.path).map_err(|e| {
        warn!(error = %e, "Zoom control unavailable");
        BackendError::InitializationFailed(format!("zoom: {}", e))
    })?;
    let (zoom, zoom_task) = zoom::spawn_zoom_actor(control);

    let slot = LatestFrameSlot::new();
    let pipeline = CameraPipeline::new(&device, &options.analysis, Arc::clone(&slot), preview)?;

    Ok(CameraBinding {
        device,
        pipeline,
        slot,
        zoom,
        zoom_task,
        digital_view,
    })
}
