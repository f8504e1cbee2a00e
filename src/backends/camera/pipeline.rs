// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 GStreamer pipeline for frame analysis
//!
//! ```text
//! v4l2src ! decodebin ! videoconvert ! videoscale ! RGBA WxH ! appsink
//!                                                                │
//!                                     FrameHandle ◄─ mapped ─────┤
//!                                     (LatestFrameSlot)          │
//!                                                                └─ copy ─► preview channel
//! ```
//!
//! The appsink holds at most one buffer and drops older ones, and the slot
//! behind it overwrites, so analysis always sees the newest frame.

use super::types::*;
use crate::constants::{pipeline, timing};
use crate::frame_processor::{FrameHandle, FrameRelease, LatestFrameSlot};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, trace, warn};

/// Analysis stream settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Target width delivered to analysis
    pub width: u32,
    /// Target height delivered to analysis
    pub height: u32,
    /// Clockwise rotation to apply before decoding
    pub rotation: SensorRotation,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            width: crate::constants::analysis::TARGET_WIDTH,
            height: crate::constants::analysis::TARGET_HEIGHT,
            rotation: SensorRotation::None,
        }
    }
}

/// Tracks buffers handed out to analysis and not yet released
#[derive(Debug, Default)]
pub struct BufferLedger {
    outstanding: AtomicU64,
    released: AtomicU64,
}

impl BufferLedger {
    fn checkout(&self) {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames currently held by analysis
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Frames returned so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

impl FrameRelease for BufferLedger {
    fn release(&self, sequence: u64) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(sequence, "Frame buffer returned");
    }
}

/// Build the gst-launch description for a device
pub fn pipeline_description(device_path: &str, config: &AnalysisConfig) -> String {
    format!(
        "v4l2src device={} ! decodebin ! videoconvert ! videoscale ! \
         video/x-raw,format={},width={},height={},pixel-aspect-ratio=1/1 ! \
         appsink name=sink",
        device_path,
        pipeline::OUTPUT_FORMAT,
        config.width,
        config.height
    )
}

/// Running capture pipeline
pub struct CameraPipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    ledger: Arc<BufferLedger>,
    frames: Arc<AtomicU64>,
}

impl CameraPipeline {
    /// Build and start a pipeline for `device`
    ///
    /// Every sample becomes a [`FrameHandle`] pushed into `slot`. When
    /// `preview` is given, a copy of each frame is offered to it without
    /// blocking.
    pub fn new(
        device: &CameraDevice,
        config: &AnalysisConfig,
        slot: Arc<LatestFrameSlot>,
        preview: Option<FrameSender>,
    ) -> BackendResult<Self> {
        info!(
            device = %device.name,
            path = %device.path,
            width = config.width,
            height = config.height,
            rotation = %config.rotation,
            "Creating camera pipeline"
        );

        gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let description = pipeline_description(&device.path, config);
        debug!(pipeline = %description, "Launching pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| BackendError::InitializationFailed("Not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let ledger = Arc::new(BufferLedger::default());
        let frames = Arc::new(AtomicU64::new(0));
        let rotation = config.rotation;

        let callback_ledger = Arc::clone(&ledger);
        let callback_frames = Arc::clone(&frames);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_num = callback_frames.fetch_add(1, Ordering::Relaxed);

                    let sample = match appsink.pull_sample() {
                        Ok(s) => s,
                        Err(e) => {
                            if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                                error!(frame = frame_num, error = ?e, "Failed to pull sample");
                            }
                            return Err(gstreamer::FlowError::Eos);
                        }
                    };

                    let image = sample_to_frame(&sample, frame_num);

                    if let (Some(frame), Some(sender)) = (&image, &preview) {
                        let mut sender = sender.clone();
                        if let Err(e) = sender.try_send(frame.to_copied())
                            && frame_num % timing::FRAME_LOG_INTERVAL == 0
                        {
                            debug!(frame = frame_num, error = ?e, "Preview frame dropped");
                        }
                    }

                    callback_ledger.checkout();
                    let releaser: Arc<dyn FrameRelease> = callback_ledger.clone();
                    let handle = FrameHandle::new(image, rotation, frame_num, Some(releaser));

                    if !slot.push(handle) && frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(frame = frame_num, "Analysis slot closed, frame discarded");
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
        })?;

        let (result, state, pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if state != gstreamer::State::Playing {
            warn!("Pipeline is not in PLAYING state");
        }

        info!(path = %device.path, "Camera pipeline running");

        Ok(Self {
            pipeline,
            appsink,
            ledger,
            frames,
        })
    }

    /// Samples received from the camera
    pub fn frames_captured(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Stop the pipeline and release the camera
    pub fn stop(self) -> BackendResult<()> {
        info!("Stopping camera pipeline");

        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| BackendError::Other(format!("Failed to stop pipeline: {}", e)))?;

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        match result {
            Ok(_) => info!(state = ?state, frames = self.frames_captured(), "Camera pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }

        if self.ledger.outstanding() > 0 {
            debug!(outstanding = self.ledger.outstanding(), "Frames still held at stop");
        }

        Ok(())
    }
}

/// Turn an appsink sample into a frame
///
/// `None` when the sample carries no usable image; the analyzer logs and
/// releases such frames without decoding.
fn sample_to_frame(sample: &gstreamer::Sample, frame_num: u64) -> Option<CameraFrame> {
    let log_this = frame_num % timing::FRAME_LOG_INTERVAL == 0;

    let Some(buffer) = sample.buffer_owned() else {
        if log_this {
            warn!(frame = frame_num, "No buffer in sample");
        }
        return None;
    };

    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        if log_this {
            warn!(frame = frame_num, "Buffer marked as corrupted");
        }
        return None;
    }

    let video_info = sample
        .caps()
        .and_then(|caps| VideoInfo::from_caps(caps).ok());
    let Some(video_info) = video_info else {
        if log_this {
            warn!(frame = frame_num, "Sample has no usable caps");
        }
        return None;
    };

    let format_name = video_info.format().to_string();
    let Some(format) = PixelFormat::from_gst_format(&format_name) else {
        if log_this {
            warn!(frame = frame_num, format = %format_name, "Unsupported sample format");
        }
        return None;
    };

    let mapped = match buffer.into_mapped_buffer_readable() {
        Ok(mapped) => mapped,
        Err(_) => {
            if log_this {
                warn!(frame = frame_num, "Failed to map buffer");
            }
            return None;
        }
    };

    Some(CameraFrame {
        width: video_info.width(),
        height: video_info.height(),
        data: FrameData::from_mapped_buffer(mapped),
        format,
        stride: video_info.stride()[0] as u32,
        captured_at: std::time::Instant::now(),
    })
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("Camera pipeline dropped");
    }
}
