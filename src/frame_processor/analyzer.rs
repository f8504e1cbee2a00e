// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis loop
//!
//! For every delivered frame: copy the pixels into decoder input, submit the
//! decode, release the frame, and when the decode completes map the result
//! onto the zoom control.
//!
//! | decode result     | zoom              |
//! |-------------------|-------------------|
//! | symbols found     | 2.0               |
//! | no symbols        | 1.0               |
//! | decoder error     | left unchanged    |
//!
//! Failures never reset the zoom; only an explicit empty result does.

use super::frame_handle::FrameHandle;
use super::input_image::InputImage;
use super::latest_frame::LatestFrameSlot;
use super::tasks::BarcodeDecoder;
use super::types::DecodedSymbol;
use crate::backends::camera::zoom::ZoomHandle;
use crate::constants::{analysis, timing};
use crate::constants::zoom::{ZOOM_FOUND, ZOOM_NEUTRAL};
use crate::errors::DecodeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// What a single decode completion did
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Symbols decoded, zoom set to 2.0
    Found(Vec<DecodedSymbol>),
    /// Nothing decoded, zoom set to 1.0
    Empty,
    /// Decoder failed, zoom untouched
    Failed(DecodeError),
}

/// Counters kept by the analyzer
#[derive(Debug, Default)]
pub struct AnalyzerStats {
    submitted: AtomicU64,
    missing_image: AtomicU64,
    found: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`AnalyzerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub missing_image: u64,
    pub found: u64,
    pub empty: u64,
    pub failed: u64,
}

impl AnalyzerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            missing_image: self.missing_image.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Per-frame barcode analysis with zoom feedback
pub struct FrameAnalyzer<D> {
    decoder: Arc<D>,
    zoom: ZoomHandle,
    max_dimension: u32,
    listener: Option<mpsc::UnboundedSender<Vec<DecodedSymbol>>>,
    stats: Arc<AnalyzerStats>,
}

impl<D: BarcodeDecoder> FrameAnalyzer<D> {
    pub fn new(decoder: D, zoom: ZoomHandle, max_dimension: u32) -> Self {
        Self {
            decoder: Arc::new(decoder),
            zoom,
            max_dimension,
            listener: None,
            stats: Arc::new(AnalyzerStats::default()),
        }
    }

    /// Also deliver every non-empty result to `listener`
    pub fn with_symbol_listener(mut self, listener: mpsc::UnboundedSender<Vec<DecodedSymbol>>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Analyze one frame
    ///
    /// Returns before the decode result is known. The frame is released on
    /// every path before this returns. `None` means the frame had no image
    /// and no decode was started; otherwise the handle resolves once the
    /// completion has been applied.
    pub fn analyze(&self, frame: FrameHandle) -> Option<JoinHandle<DecodeOutcome>> {
        self.analyze_with_permit(frame, None)
    }

    fn analyze_with_permit(
        &self,
        frame: FrameHandle,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Option<JoinHandle<DecodeOutcome>> {
        let sequence = frame.sequence();

        let Some(image) = frame.image() else {
            error!(sequence, "Camera frame has no image data");
            self.stats.missing_image.fetch_add(1, Ordering::Relaxed);
            frame.close();
            return None;
        };

        if sequence % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                sequence,
                width = image.width,
                height = image.height,
                format = ?image.format,
                rotation = %frame.rotation(),
                "Analyzing frame"
            );
        }

        let submitted = InputImage::from_frame(image, frame.rotation(), self.max_dimension)
            .map(|input| self.decoder.process(input));
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        // The decode owns a copy; give the buffer back now
        frame.close();

        let zoom = self.zoom.clone();
        let listener = self.listener.clone();
        let stats = Arc::clone(&self.stats);

        Some(tokio::spawn(async move {
            let result = match submitted {
                Ok(pending) => pending.await,
                Err(e) => Err(e),
            };
            let outcome = complete(sequence, result, &zoom, listener.as_ref(), &stats).await;
            drop(permit);
            outcome
        }))
    }

    /// Feed frames from `slot` until it closes
    ///
    /// At most `max_in_flight` decodes run at once (clamped to
    /// 1..=[`analysis::MAX_IN_FLIGHT_DECODES`]); while all are busy the slot
    /// keeps only the newest frame. Waits for outstanding decodes before
    /// returning.
    pub async fn run(&self, slot: Arc<LatestFrameSlot>, max_in_flight: usize) {
        let max_in_flight = max_in_flight.clamp(1, analysis::MAX_IN_FLIGHT_DECODES);
        let permits = Arc::new(Semaphore::new(max_in_flight));
        info!(max_in_flight, "Frame analysis started");

        loop {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let Some(frame) = slot.recv().await else {
                break;
            };
            self.analyze_with_permit(frame, Some(permit));
        }

        // Drain in-flight decodes
        let _ = permits.acquire_many(max_in_flight as u32).await;

        let stats = self.stats();
        info!(
            submitted = stats.submitted,
            found = stats.found,
            empty = stats.empty,
            failed = stats.failed,
            missing_image = stats.missing_image,
            dropped = slot.dropped(),
            "Frame analysis stopped"
        );
    }
}

async fn complete(
    sequence: u64,
    result: Result<Vec<DecodedSymbol>, DecodeError>,
    zoom: &ZoomHandle,
    listener: Option<&mpsc::UnboundedSender<Vec<DecodedSymbol>>>,
    stats: &AnalyzerStats,
) -> DecodeOutcome {
    match result {
        Ok(symbols) if !symbols.is_empty() => {
            stats.found.fetch_add(1, Ordering::Relaxed);
            for symbol in &symbols {
                info!(
                    sequence,
                    format = %symbol.format,
                    value = %symbol.display_value,
                    "Detected barcode"
                );
            }
            apply_zoom(zoom, ZOOM_FOUND).await;
            if let Some(listener) = listener {
                let _ = listener.send(symbols.clone());
            }
            DecodeOutcome::Found(symbols)
        }
        Ok(_) => {
            stats.empty.fetch_add(1, Ordering::Relaxed);
            trace!(sequence, "No barcode in frame");
            apply_zoom(zoom, ZOOM_NEUTRAL).await;
            DecodeOutcome::Empty
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(sequence, error = %e, "Barcode scanning failed");
            DecodeOutcome::Failed(e)
        }
    }
}

async fn apply_zoom(zoom: &ZoomHandle, ratio: f32) {
    if let Err(e) = zoom.set(ratio).await {
        warn!(ratio, error = %e, "Zoom update not applied");
    }
}
