// SPDX-License-Identifier: GPL-3.0-only

//! Scan session orchestration
//!
//! permission gate ─grant─► bind camera ─► analysis loop ─► shutdown
//!        │
//!        └─deny─► log, nothing else

use crate::backends::camera::{
    ActiveCamera, CameraBinder, CameraDevice, DigitalZoomView, FrameSender, SystemCamera, ZoomHandle,
};
use crate::config::Config;
use crate::constants::zoom::ZOOM_NEUTRAL;
use crate::errors::AppResult;
use crate::frame_processor::{DecodedSymbol, FrameAnalyzer, MultiFormatDecoder, StatsSnapshot};
use crate::permission::{PermissionGate, PermissionProvider};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Camera access was refused; nothing was bound
    PermissionDenied,
    /// Camera ran until shutdown
    Completed {
        frames: u64,
        dropped: u64,
        analysis: StatsSnapshot,
    },
}

/// Handed to the caller once the camera is bound
#[derive(Debug, Clone)]
pub struct BoundCamera {
    pub device: CameraDevice,
    pub zoom: ZoomHandle,
    /// Present when the preview has to crop for zoom
    pub digital_view: Option<DigitalZoomView>,
}

/// One run of permission → camera → analysis
pub struct ScanSession<B = SystemCamera> {
    config: Config,
    binder: B,
    preview: Option<FrameSender>,
    listener: Option<mpsc::UnboundedSender<Vec<DecodedSymbol>>>,
    bound: Option<oneshot::Sender<BoundCamera>>,
}

impl ScanSession {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            binder: SystemCamera,
            preview: None,
            listener: None,
            bound: None,
        }
    }
}

impl<B: CameraBinder> ScanSession<B> {
    /// Open the camera through another binder
    pub fn with_binder<C: CameraBinder>(self, binder: C) -> ScanSession<C> {
        ScanSession {
            config: self.config,
            binder,
            preview: self.preview,
            listener: self.listener,
            bound: self.bound,
        }
    }

    /// Offer frame copies to a preview
    pub fn with_preview(mut self, preview: FrameSender) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Receive every non-empty decode result
    pub fn with_symbol_listener(mut self, listener: mpsc::UnboundedSender<Vec<DecodedSymbol>>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Be told which camera was bound and how to read its zoom
    pub fn on_bound(mut self, notify: oneshot::Sender<BoundCamera>) -> Self {
        self.bound = Some(notify);
        self
    }

    /// Run until `shutdown` resolves
    ///
    /// A denied permission returns immediately without touching the
    /// camera.
    pub async fn run<P, S>(self, gate: &mut PermissionGate<P>, shutdown: S) -> AppResult<SessionOutcome>
    where
        P: PermissionProvider,
        S: Future<Output = ()>,
    {
        match gate.request_then(|| self.activate(shutdown)).await {
            Some(result) => result,
            None => Ok(SessionOutcome::PermissionDenied),
        }
    }

    async fn activate<S: Future<Output = ()>>(self, shutdown: S) -> AppResult<SessionOutcome> {
        let binding = self.binder.bind(
            &self.config.camera_selector(),
            &self.config.bind_options(),
            self.preview,
        )?;

        if let Some(notify) = self.bound {
            let _ = notify.send(BoundCamera {
                device: binding.device().clone(),
                zoom: binding.zoom(),
                digital_view: binding.digital_view(),
            });
        }

        let decoder = MultiFormatDecoder::new(self.config.decoder_options());
        let mut analyzer = FrameAnalyzer::new(
            decoder,
            binding.zoom(),
            self.config.max_decode_dimension,
        );
        if let Some(listener) = self.listener {
            analyzer = analyzer.with_symbol_listener(listener);
        }

        let slot = binding.slot();
        let max_in_flight = self.config.max_in_flight_decodes;
        let analysis = tokio::spawn(async move {
            analyzer.run(slot, max_in_flight).await;
            analyzer.stats()
        });

        info!(device = %binding.device().path, "Scanning");
        shutdown.await;
        debug!("Shutdown requested");

        let frames = binding.frames_captured();
        let slot = binding.slot();
        let zoom = binding.zoom();
        binding.shutdown()?;

        let analysis = match analysis.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Analysis task ended abnormally");
                StatsSnapshot::default()
            }
        };

        // Hand the camera back unzoomed
        if let Err(e) = zoom.set(ZOOM_NEUTRAL).await {
            debug!(error = %e, "Could not restore neutral zoom");
        }

        Ok(SessionOutcome::Completed {
            frames,
            dropped: slot.dropped(),
            analysis,
        })
    }
}
