// SPDX-License-Identifier: GPL-3.0-only

//! Raw V4L2 control access
//!
//! The `v4l` crate covers capability and format queries but not the
//! camera-class controls, so those go through `VIDIOC_*CTRL` ioctls on a
//! device node held open for the lifetime of a [`ControlDevice`].
//!
//! Inspired by [cameractrls](https://github.com/soyersoyer/cameractrls).

use crate::errors::ZoomError;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use tracing::debug;

const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

/// Absolute zoom (driver units, UVC cameras commonly use 100 = 1.0x)
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;

const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// (dir << 30) | (size << 16) | ('V' << 8) | nr
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

#[repr(C)]
#[derive(Default)]
struct RawControl {
    id: u32,
    value: i32,
}

#[repr(C)]
#[derive(Default)]
struct RawQuery {
    id: u32,
    kind: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Range and flags of one control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub integer: bool,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    /// Clamp into range, snapping down to the step grid
    pub fn clamp(&self, value: i32) -> i32 {
        let clamped = value.clamp(self.minimum, self.maximum);
        if self.step > 1 {
            self.minimum + ((clamped - self.minimum) / self.step) * self.step
        } else {
            clamped
        }
    }
}

/// Open V4L2 node used for control reads and writes
#[derive(Debug)]
pub struct ControlDevice {
    path: String,
    file: File,
}

impl ControlDevice {
    pub fn open(path: &str) -> Result<Self, ZoomError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ZoomError::Device(format!("{}: {}", path, e)))?;
        Ok(Self {
            path: path.to_string(),
            file,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> Result<(), std::io::Error> {
        // SAFETY: `arg` is a #[repr(C)] struct matching the layout `request` expects
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), request, arg as *mut T) };
        if result < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Describe a control; fails if the driver does not have it
    pub fn query(&self, id: u32) -> Result<ControlInfo, ZoomError> {
        let mut raw = RawQuery {
            id,
            ..RawQuery::default()
        };
        self.ioctl(VIDIOC_QUERYCTRL, &mut raw).map_err(|e| {
            ZoomError::NotSupported(format!("{} control {:#x}: {}", self.path, id, e))
        })?;

        let name_len = raw.name.iter().position(|&c| c == 0).unwrap_or(raw.name.len());
        Ok(ControlInfo {
            id: raw.id,
            name: String::from_utf8_lossy(&raw.name[..name_len]).into_owned(),
            minimum: raw.minimum,
            maximum: raw.maximum,
            step: raw.step,
            default_value: raw.default_value,
            integer: raw.kind == V4L2_CTRL_TYPE_INTEGER,
            flags: raw.flags,
        })
    }

    pub fn get(&self, id: u32) -> Result<i32, ZoomError> {
        let mut raw = RawControl { id, value: 0 };
        self.ioctl(VIDIOC_G_CTRL, &mut raw)
            .map_err(|e| ZoomError::Device(format!("read control {:#x}: {}", id, e)))?;
        Ok(raw.value)
    }

    /// Write a value; the driver may adjust it, the applied value is returned
    pub fn set(&self, id: u32, value: i32) -> Result<i32, ZoomError> {
        let mut raw = RawControl { id, value };
        self.ioctl(VIDIOC_S_CTRL, &mut raw)
            .map_err(|e| ZoomError::Device(format!("write control {:#x}={}: {}", id, value, e)))?;
        if raw.value != value {
            debug!(path = %self.path, id, requested = value, applied = raw.value, "Driver adjusted control value");
        }
        Ok(raw.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom_info(step: i32) -> ControlInfo {
        ControlInfo {
            id: V4L2_CID_ZOOM_ABSOLUTE,
            name: "Zoom, Absolute".into(),
            minimum: 100,
            maximum: 500,
            step,
            default_value: 100,
            integer: true,
            flags: 0,
        }
    }

    #[test]
    fn test_zoom_control_id() {
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a090d);
    }

    #[test]
    fn test_clamp_snaps_to_step() {
        let info = zoom_info(10);
        assert_eq!(info.clamp(205), 200);
        assert_eq!(info.clamp(900), 500);
        assert_eq!(info.clamp(0), 100);
        assert_eq!(zoom_info(1).clamp(205), 205);
    }

    #[test]
    fn test_open_missing_device() {
        let err = ControlDevice::open("/dev/does-not-exist").unwrap_err();
        assert!(matches!(err, ZoomError::Device(_)));
    }
}
