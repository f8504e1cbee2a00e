// SPDX-License-Identifier: GPL-3.0-only

//! Direct device access check
//!
//! Outside a sandbox there is nothing to ask; access to the camera is
//! whatever the file permissions on the device node allow (usually
//! membership in the `video` group).

use super::{Capability, PermissionProvider};
use crate::errors::PermissionError;
use std::ffi::CString;
use std::path::Path;
use tracing::debug;

/// Grants access when the device node is readable and writable
#[derive(Debug, Clone)]
pub struct DevicePermission {
    device_path: String,
}

impl DevicePermission {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn check(&self) -> Result<bool, PermissionError> {
        if !Path::new(&self.device_path).exists() {
            return Err(PermissionError::DeviceNotFound(self.device_path.clone()));
        }

        let c_path = CString::new(self.device_path.as_bytes())
            .map_err(|_| PermissionError::DeviceNotFound(self.device_path.clone()))?;

        // SAFETY: c_path is a valid NUL-terminated string for the call duration
        let result = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
        if result != 0 {
            let errno = std::io::Error::last_os_error();
            debug!(device_path = %self.device_path, ?errno, "Camera device not accessible");
            return Ok(false);
        }

        Ok(true)
    }
}

impl PermissionProvider for DevicePermission {
    async fn request(&self, capability: Capability) -> Result<bool, PermissionError> {
        debug!(%capability, device_path = %self.device_path, "Checking device access");
        self.check()
    }

    fn name(&self) -> &'static str {
        "device"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_device_is_error() {
        let provider = DevicePermission::new("/dev/video-does-not-exist");
        assert_eq!(
            provider.request(Capability::Camera).await,
            Err(PermissionError::DeviceNotFound(
                "/dev/video-does-not-exist".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_accessible_file_is_granted() {
        let path = std::env::temp_dir().join(format!("barcode-camera-perm-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        let provider = DevicePermission::new(path.to_string_lossy());
        assert_eq!(provider.request(Capability::Camera).await, Ok(true));
        std::fs::remove_file(&path).unwrap();
    }
}
