// SPDX-License-Identifier: GPL-3.0-only

//! Shared test helpers: log capture and fakes for the crate's traits

#![allow(dead_code)]

use barcode_camera::backends::camera::types::{
    BackendError, BackendResult, CameraDevice, CameraFrame, CameraSelector, FrameSender, SensorRotation,
};
use barcode_camera::backends::camera::{ActiveCamera, BindOptions, CameraBinder, DigitalZoomView, ZoomHandle};
use barcode_camera::backends::camera::zoom::ZoomControl;
use barcode_camera::errors::{DecodeError, ZoomError};
use barcode_camera::frame_processor::{
    BarcodeDecoder, DecodedSymbol, FrameHandle, FrameRelease, InputImage, LatestFrameSlot,
    ReleaseCounter,
};
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// One recorded log event
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

/// Layer that records every event
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install for the current thread; logs stop being captured when the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

/// Zoom control that remembers every ratio written to it
#[derive(Clone, Default)]
pub struct RecordingZoom {
    writes: Arc<Mutex<Vec<f32>>>,
}

impl RecordingZoom {
    pub fn writes(&self) -> Vec<f32> {
        self.writes.lock().unwrap().clone()
    }
}

impl ZoomControl for RecordingZoom {
    fn set_zoom_ratio(&mut self, ratio: f32) -> Result<(), ZoomError> {
        self.writes.lock().unwrap().push(ratio);
        Ok(())
    }

    fn zoom_ratio(&self) -> f32 {
        self.writes.lock().unwrap().last().copied().unwrap_or(1.0)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Decoder that answers every call with the same result
pub struct FixedDecoder {
    result: Result<Vec<DecodedSymbol>, DecodeError>,
    calls: Arc<AtomicUsize>,
}

impl FixedDecoder {
    pub fn new(result: Result<Vec<DecodedSymbol>, DecodeError>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                result,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl BarcodeDecoder for FixedDecoder {
    fn process(
        &self,
        _image: InputImage,
    ) -> impl Future<Output = Result<Vec<DecodedSymbol>, DecodeError>> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        async move { result }
    }
}

/// Decoder whose results are supplied later by the test, in call order
#[derive(Default)]
pub struct ControlledDecoder {
    pending: Mutex<VecDeque<oneshot::Receiver<Result<Vec<DecodedSymbol>, DecodeError>>>>,
}

impl ControlledDecoder {
    /// Queue the next call and return the sender that completes it
    pub fn expect_call(&self) -> oneshot::Sender<Result<Vec<DecodedSymbol>, DecodeError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }
}

impl BarcodeDecoder for ControlledDecoder {
    fn process(
        &self,
        _image: InputImage,
    ) -> impl Future<Output = Result<Vec<DecodedSymbol>, DecodeError>> + Send + 'static {
        let next = self.pending.lock().unwrap().pop_front();
        async move {
            match next {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(DecodeError::Panicked("sender dropped".into()))),
                None => Err(DecodeError::Decoder("unexpected call".into())),
            }
        }
    }
}

/// Camera fed by the test through its slot
pub struct FakeCamera {
    device: CameraDevice,
    slot: Arc<LatestFrameSlot>,
    zoom: ZoomHandle,
    shutdowns: Arc<AtomicUsize>,
}

impl ActiveCamera for FakeCamera {
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
        None
    }

    fn frames_captured(&self) -> u64 {
        self.slot.delivered() + self.slot.dropped()
    }

    fn shutdown(self) -> BackendResult<()> {
        self.slot.close();
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Binder that hands out one prepared [`FakeCamera`]
pub struct FakeBinder {
    camera: Mutex<Option<FakeCamera>>,
    binds: Arc<AtomicUsize>,
}

/// What a test keeps to drive and inspect a [`FakeBinder`]
pub struct FakeCameraParts {
    pub slot: Arc<LatestFrameSlot>,
    pub binds: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl FakeBinder {
    pub fn new(zoom: ZoomHandle) -> (Self, FakeCameraParts) {
        let slot = LatestFrameSlot::new();
        let binds = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let camera = FakeCamera {
            device: CameraDevice {
                name: "Fake Camera".into(),
                path: "/dev/video-fake".into(),
                index: 0,
            },
            slot: Arc::clone(&slot),
            zoom,
            shutdowns: Arc::clone(&shutdowns),
        };
        (
            Self {
                camera: Mutex::new(Some(camera)),
                binds: Arc::clone(&binds),
            },
            FakeCameraParts {
                slot,
                binds,
                shutdowns,
            },
        )
    }
}

impl CameraBinder for FakeBinder {
    type Camera = FakeCamera;

    fn bind(
        &self,
        _selector: &CameraSelector,
        _options: &BindOptions,
        _preview: Option<FrameSender>,
    ) -> BackendResult<FakeCamera> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.camera
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BackendError::Other("camera already bound".into()))
    }
}

/// Small gray frame with the given release tracker
pub fn frame(counter: &Arc<ReleaseCounter>, sequence: u64) -> FrameHandle {
    let releaser: Arc<dyn FrameRelease> = counter.clone();
    FrameHandle::new(
        Some(CameraFrame::from_gray(16, 16, vec![200; 256])),
        SensorRotation::None,
        sequence,
        Some(releaser),
    )
}

/// Frame whose image data is missing
pub fn empty_frame(counter: &Arc<ReleaseCounter>, sequence: u64) -> FrameHandle {
    let releaser: Arc<dyn FrameRelease> = counter.clone();
    FrameHandle::new(None, SensorRotation::None, sequence, Some(releaser))
}

/// Frame carrying a rendered test image
pub fn image_frame(counter: &Arc<ReleaseCounter>, sequence: u64, image: GrayImage) -> FrameHandle {
    let releaser: Arc<dyn FrameRelease> = counter.clone();
    let (width, height) = image.dimensions();
    FrameHandle::new(
        Some(CameraFrame::from_gray(width, height, image.into_raw())),
        SensorRotation::None,
        sequence,
        Some(releaser),
    )
}

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// QR code, 4 px per module with a 4 module quiet zone
pub fn qr_image(text: &str) -> GrayImage {
    const SCALE: u32 = 4;
    const QUIET: u32 = 4;

    let code = qrcode::QrCode::new(text.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET) * SCALE;

    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / SCALE, y / SCALE);
        if mx < QUIET || my < QUIET || mx >= QUIET + modules || my >= QUIET + modules {
            return LIGHT;
        }
        let index = ((my - QUIET) * modules + (mx - QUIET)) as usize;
        if colors[index] == qrcode::Color::Dark {
            DARK
        } else {
            LIGHT
        }
    })
}

/// EAN-13 barcode, 3 px per module with a 12 module quiet zone
pub fn ean13_image(digits: &str) -> GrayImage {
    const SCALE: u32 = 3;
    const QUIET: u32 = 12;
    const HEIGHT: u32 = 90;

    let bars = barcoders::sym::ean13::EAN13::new(digits).unwrap().encode();
    let modules = bars.len() as u32;
    let width = (modules + 2 * QUIET) * SCALE;

    GrayImage::from_fn(width, HEIGHT, |x, y| {
        let module = x / SCALE;
        let in_bars = module >= QUIET && module < QUIET + modules;
        let in_rows = (10..HEIGHT - 10).contains(&y);
        if in_bars && in_rows && bars[(module - QUIET) as usize] == 1 {
            DARK
        } else {
            LIGHT
        }
    })
}
