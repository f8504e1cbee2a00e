// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera enumeration
//!
//! Scans `/dev/video*` and keeps nodes that advertise video capture and
//! list at least one capture format. Metadata nodes created by UVC drivers
//! report the capture capability on the device but have no formats.

use super::types::{BackendError, BackendResult, CameraDevice, CameraSelector};
use tracing::{debug, info};
use v4l::capability::Flags;
use v4l::prelude::*;
use v4l::video::Capture;

/// Node index from a `/dev/videoN` path
fn node_index(path: &str) -> Option<usize> {
    path.strip_prefix("/dev/video")?.parse().ok()
}

/// List capture-capable cameras, ordered by node index
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let mut paths: Vec<(usize, String)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let path = entry.path().to_string_lossy().to_string();
            node_index(&path).map(|index| (index, path))
        })
        .collect();
    paths.sort();

    let mut cameras = Vec::new();
    for (index, path) in paths {
        let device = match Device::with_path(&path) {
            Ok(device) => device,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unopenable video node");
                continue;
            }
        };

        let Ok(caps) = device.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            debug!(path = %path, card = %caps.card, "Not a capture device");
            continue;
        }

        let has_formats = device
            .enum_formats()
            .map(|formats| !formats.is_empty())
            .unwrap_or(false);
        if !has_formats {
            debug!(path = %path, card = %caps.card, "Capture node has no formats");
            continue;
        }

        debug!(path = %path, card = %caps.card, driver = %caps.driver, "Found camera");
        cameras.push(CameraDevice {
            name: caps.card,
            path,
            index,
        });
    }

    info!(count = cameras.len(), "Enumerated V4L2 cameras");
    cameras
}

/// Pick a device from `cameras` according to `selector`
///
/// An explicit path is accepted even when it was not enumerated so that
/// nodes without read permission can still be named on the command line.
pub fn select_camera(cameras: &[CameraDevice], selector: &CameraSelector) -> BackendResult<CameraDevice> {
    match selector {
        CameraSelector::Default => cameras
            .first()
            .cloned()
            .ok_or_else(|| BackendError::DeviceNotFound("no cameras found".to_string())),
        CameraSelector::Index(index) => cameras.get(*index).cloned().ok_or_else(|| {
            BackendError::DeviceNotFound(format!(
                "camera index {} out of range ({} found)",
                index,
                cameras.len()
            ))
        }),
        CameraSelector::Path(path) => Ok(cameras
            .iter()
            .find(|camera| &camera.path == path)
            .cloned()
            .unwrap_or_else(|| CameraDevice {
                name: path.clone(),
                path: path.clone(),
                index: node_index(path).unwrap_or(0),
            })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cameras() -> Vec<CameraDevice> {
        vec![
            CameraDevice {
                name: "Integrated Camera".into(),
                path: "/dev/video0".into(),
                index: 0,
            },
            CameraDevice {
                name: "USB Camera".into(),
                path: "/dev/video2".into(),
                index: 2,
            },
        ]
    }

    #[test]
    fn test_node_index() {
        assert_eq!(node_index("/dev/video12"), Some(12));
        assert_eq!(node_index("/dev/media0"), None);
    }

    #[test]
    fn test_select_camera() {
        let cameras = cameras();
        assert_eq!(
            select_camera(&cameras, &CameraSelector::Default).unwrap().path,
            "/dev/video0"
        );
        assert_eq!(
            select_camera(&cameras, &CameraSelector::Index(1)).unwrap().name,
            "USB Camera"
        );
        assert!(select_camera(&cameras, &CameraSelector::Index(5)).is_err());
        assert!(select_camera(&[], &CameraSelector::Default).is_err());

        let named = select_camera(&cameras, &CameraSelector::Path("/dev/video7".into())).unwrap();
        assert_eq!(named.index, 7);
    }
}
