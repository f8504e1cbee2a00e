// SPDX-License-Identifier: GPL-3.0-only

//! Camera zoom control
//!
//! ```text
//!  decode completion ─┐
//!  decode completion ─┼─► ZoomHandle ──mpsc──► ZoomActor ──► dyn ZoomControl
//!  decode completion ─┘                            │
//!                                                  └──watch──► preview / status
//! ```
//!
//! Every write goes through one actor task that owns the control, so writes
//! from overlapping completions are applied one at a time in arrival order.

use super::v4l2_controls::{ControlDevice, ControlInfo, V4L2_CID_ZOOM_ABSOLUTE};
use crate::constants::zoom::{NARROW_RANGE_MAX_RATIO, V4L2_UNITS_PER_RATIO, ZOOM_NEUTRAL};
use crate::errors::ZoomError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which zoom implementation to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomBackend {
    /// V4L2 control when the device has one, digital crop otherwise
    #[default]
    Auto,
    V4l2,
    Digital,
}

/// Something that can change the camera's zoom ratio
pub trait ZoomControl: Send + 'static {
    /// Apply a zoom ratio (1.0 = no zoom)
    fn set_zoom_ratio(&mut self, ratio: f32) -> Result<(), ZoomError>;

    /// Ratio currently in effect
    fn zoom_ratio(&self) -> f32;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Optical/sensor zoom through the V4L2 `ZOOM_ABSOLUTE` control
#[derive(Debug)]
pub struct V4l2Zoom {
    device: ControlDevice,
    info: ControlInfo,
    units_per_ratio: f32,
}

impl V4l2Zoom {
    /// Open the zoom control of a device node
    pub fn open(device_path: &str) -> Result<Self, ZoomError> {
        let device = ControlDevice::open(device_path)?;
        let info = device.query(V4L2_CID_ZOOM_ABSOLUTE)?;

        if info.is_disabled() {
            return Err(ZoomError::NotSupported(format!(
                "{} zoom control is disabled",
                device_path
            )));
        }

        let units_per_ratio = Self::units_per_ratio(&info);
        info!(
            device_path,
            min = info.minimum,
            max = info.maximum,
            step = info.step,
            units_per_ratio,
            "Using V4L2 zoom control"
        );

        Ok(Self {
            device,
            info,
            units_per_ratio,
        })
    }

    /// Control units per 1.0x of ratio
    ///
    /// V4L2 attaches no ratio meaning to `ZOOM_ABSOLUTE`, so this is a
    /// heuristic. Controls spanning at least [`V4L2_UNITS_PER_RATIO`] use
    /// the UVC convention of 100 units per 1.0x. Narrower controls are
    /// mapped linearly with the maximum taken as [`NARROW_RANGE_MAX_RATIO`].
    pub fn units_per_ratio(info: &ControlInfo) -> f32 {
        let span = info.maximum.saturating_sub(info.minimum);
        if span >= V4L2_UNITS_PER_RATIO {
            V4L2_UNITS_PER_RATIO as f32
        } else {
            span.max(1) as f32 / (NARROW_RANGE_MAX_RATIO - 1.0)
        }
    }

    /// Control value for a ratio; the control minimum is taken as 1.0x
    pub fn ratio_to_value(info: &ControlInfo, units_per_ratio: f32, ratio: f32) -> i32 {
        let offset = ((ratio - 1.0) * units_per_ratio).round() as i32;
        info.clamp(info.minimum.saturating_add(offset))
    }

    fn value_to_ratio(&self, value: i32) -> f32 {
        1.0 + (value - self.info.minimum) as f32 / self.units_per_ratio
    }
}

impl ZoomControl for V4l2Zoom {
    fn set_zoom_ratio(&mut self, ratio: f32) -> Result<(), ZoomError> {
        if !ratio.is_finite() || ratio < 1.0 {
            return Err(ZoomError::OutOfRange(ratio));
        }
        let value = Self::ratio_to_value(&self.info, self.units_per_ratio, ratio);
        self.device.set(V4L2_CID_ZOOM_ABSOLUTE, value).map(|_| ())
    }

    fn zoom_ratio(&self) -> f32 {
        match self.device.get(V4L2_CID_ZOOM_ABSOLUTE) {
            Ok(value) => self.value_to_ratio(value),
            Err(e) => {
                debug!(path = self.device.path(), error = %e, "Zoom read failed, assuming neutral");
                ZOOM_NEUTRAL
            }
        }
    }

    fn name(&self) -> &'static str {
        "v4l2"
    }
}

/// Software zoom: the preview crops the frame center by the stored ratio
#[derive(Debug, Clone)]
pub struct DigitalZoom {
    ratio_bits: Arc<AtomicU32>,
}

impl Default for DigitalZoom {
    fn default() -> Self {
        Self {
            ratio_bits: Arc::new(AtomicU32::new(ZOOM_NEUTRAL.to_bits())),
        }
    }
}

impl DigitalZoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view for renderers
    pub fn view(&self) -> DigitalZoomView {
        DigitalZoomView {
            ratio_bits: Arc::clone(&self.ratio_bits),
        }
    }
}

impl ZoomControl for DigitalZoom {
    fn set_zoom_ratio(&mut self, ratio: f32) -> Result<(), ZoomError> {
        if !ratio.is_finite() || ratio < 1.0 {
            return Err(ZoomError::OutOfRange(ratio));
        }
        self.ratio_bits.store(ratio.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn zoom_ratio(&self) -> f32 {
        f32::from_bits(self.ratio_bits.load(Ordering::Relaxed))
    }

    fn name(&self) -> &'static str {
        "digital"
    }
}

/// Shared read side of a [`DigitalZoom`]
#[derive(Debug, Clone)]
pub struct DigitalZoomView {
    ratio_bits: Arc<AtomicU32>,
}

impl DigitalZoomView {
    pub fn ratio(&self) -> f32 {
        f32::from_bits(self.ratio_bits.load(Ordering::Relaxed))
    }
}

/// Open the zoom control for a device
///
/// The digital view is returned when the preview has to apply the zoom
/// itself.
pub fn open_zoom(
    backend: ZoomBackend,
    device_path: &str,
) -> Result<(Box<dyn ZoomControl>, Option<DigitalZoomView>), ZoomError> {
    let digital = || {
        let zoom = DigitalZoom::new();
        let view = zoom.view();
        (Box::new(zoom) as Box<dyn ZoomControl>, Some(view))
    };

    match backend {
        ZoomBackend::V4l2 => Ok((Box::new(V4l2Zoom::open(device_path)?), None)),
        ZoomBackend::Digital => Ok(digital()),
        ZoomBackend::Auto => match V4l2Zoom::open(device_path) {
            Ok(zoom) => Ok((Box::new(zoom), None)),
            Err(e) => {
                info!(device_path, reason = %e, "Falling back to digital zoom");
                Ok(digital())
            }
        },
    }
}

enum ZoomCommand {
    Set {
        ratio: f32,
        ack: oneshot::Sender<Result<(), ZoomError>>,
    },
}

/// Cloneable sender side of the zoom actor
#[derive(Debug, Clone)]
pub struct ZoomHandle {
    commands: mpsc::Sender<ZoomCommand>,
    level: watch::Receiver<f32>,
}

impl std::fmt::Debug for ZoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoomCommand::Set { ratio, .. } => write!(f, "Set({})", ratio),
        }
    }
}

impl ZoomHandle {
    /// Ask the actor to apply a ratio and wait until it has been written
    pub async fn set(&self, ratio: f32) -> Result<(), ZoomError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(ZoomCommand::Set { ratio, ack })
            .await
            .map_err(|_| ZoomError::ActorStopped)?;
        done.await.map_err(|_| ZoomError::ActorStopped)?
    }

    /// Last ratio successfully applied
    pub fn current(&self) -> f32 {
        *self.level.borrow()
    }

    /// Watch zoom changes
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.level.clone()
    }
}

/// Start the actor that owns `control`
///
/// The actor stops once every [`ZoomHandle`] is dropped.
pub fn spawn_zoom_actor(mut control: Box<dyn ZoomControl>) -> (ZoomHandle, JoinHandle<()>) {
    let (commands, mut inbox) = mpsc::channel::<ZoomCommand>(16);
    let (level_tx, level) = watch::channel(control.zoom_ratio());

    let task = tokio::spawn(async move {
        debug!(control = control.name(), "Zoom actor started");

        while let Some(command) = inbox.recv().await {
            match command {
                ZoomCommand::Set { ratio, ack } => {
                    let result = control.set_zoom_ratio(ratio);
                    match &result {
                        Ok(()) => {
                            let previous = level_tx.send_replace(ratio);
                            if previous != ratio {
                                info!(control = control.name(), ratio, "Zoom changed");
                            }
                        }
                        Err(e) => {
                            warn!(control = control.name(), ratio, error = %e, "Failed to set zoom");
                        }
                    }
                    let _ = ack.send(result);
                }
            }
        }

        debug!(control = control.name(), "Zoom actor stopped");
    });

    (ZoomHandle { commands, level }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    fn uvc_zoom_info() -> ControlInfo {
        ControlInfo {
            id: V4L2_CID_ZOOM_ABSOLUTE,
            name: "Zoom, Absolute".into(),
            minimum: 100,
            maximum: 500,
            step: 1,
            default_value: 100,
            integer: true,
            flags: 0,
        }
    }

    #[test]
    fn test_ratio_to_v4l2_value() {
        let info = uvc_zoom_info();
        let units = V4l2Zoom::units_per_ratio(&info);
        assert_eq!(units, 100.0);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 1.0), 100);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 2.0), 200);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 9.0), 500);
    }

    #[test]
    fn test_narrow_control_is_not_maxed_by_two() {
        let info = ControlInfo {
            minimum: 0,
            maximum: 10,
            default_value: 0,
            ..uvc_zoom_info()
        };
        let units = V4l2Zoom::units_per_ratio(&info);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 1.0), 0);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 2.0), 3);
        assert_eq!(V4l2Zoom::ratio_to_value(&info, units, 4.0), 10);
    }

    #[test]
    fn test_digital_zoom_view_tracks_writes() {
        let mut zoom = DigitalZoom::new();
        let view = zoom.view();
        assert_eq!(view.ratio(), 1.0);
        zoom.set_zoom_ratio(2.0).unwrap();
        assert_eq!(view.ratio(), 2.0);
        assert_eq!(zoom.set_zoom_ratio(0.5), Err(ZoomError::OutOfRange(0.5)));
        assert_eq!(view.ratio(), 2.0);
    }

    #[test]
    fn test_auto_falls_back_to_digital() {
        let (control, view) = open_zoom(ZoomBackend::Auto, "/dev/does-not-exist").unwrap();
        assert_eq!(control.name(), "digital");
        assert!(view.is_some());
        assert!(open_zoom(ZoomBackend::V4l2, "/dev/does-not-exist").is_err());
    }

    #[tokio::test]
    async fn test_actor_applies_and_publishes() {
        let zoom = DigitalZoom::new();
        let view = zoom.view();
        let (handle, task) = spawn_zoom_actor(Box::new(zoom));
        let mut changes = handle.subscribe();

        handle.set(2.0).await.unwrap();
        assert_eq!(view.ratio(), 2.0);
        assert_eq!(handle.current(), 2.0);
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 2.0);

        drop(changes);
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_keeps_level_on_failure() {
        let (handle, _task) = spawn_zoom_actor(Box::new(DigitalZoom::new()));
        assert!(handle.set(-1.0).await.is_err());
        assert_eq!(handle.current(), 1.0);
    }
}
