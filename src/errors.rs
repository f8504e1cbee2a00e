// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera binding or pipeline errors
    Camera(BackendError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Errors raised while asking the host for camera access
///
/// These never reach the user: the permission gate logs them and treats
/// the request as denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The desktop portal is not running or has no Camera interface
    PortalUnavailable(String),
    /// D-Bus call or signal delivery failed
    Transport(String),
    /// No camera device node to check access against
    DeviceNotFound(String),
}

/// Decoder failures
///
/// Delivered through the failure branch of a decode completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame pixel format cannot be turned into decoder input
    Unsupported(String),
    /// Image buffer does not match its declared dimensions
    InvalidImage(String),
    /// The decoder rejected the image
    Decoder(String),
    /// The blocking decode task panicked or was cancelled
    Panicked(String),
}

/// Zoom control errors
#[derive(Debug, Clone, PartialEq)]
pub enum ZoomError {
    /// Device exposes no zoom control
    NotSupported(String),
    /// Requested ratio is outside what the control accepts
    OutOfRange(f32),
    /// ioctl or device access failed
    Device(String),
    /// The zoom actor task is gone
    ActorStopped,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::PortalUnavailable(msg) => write!(f, "Portal unavailable: {}", msg),
            PermissionError::Transport(msg) => write!(f, "D-Bus transport failed: {}", msg),
            PermissionError::DeviceNotFound(msg) => write!(f, "Camera device not found: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Unsupported(msg) => write!(f, "Unsupported input: {}", msg),
            DecodeError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            DecodeError::Decoder(msg) => write!(f, "Decoder failed: {}", msg),
            DecodeError::Panicked(msg) => write!(f, "Decode task aborted: {}", msg),
        }
    }
}

impl fmt::Display for ZoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomError::NotSupported(msg) => write!(f, "Zoom not supported: {}", msg),
            ZoomError::OutOfRange(ratio) => write!(f, "Zoom ratio {} out of range", ratio),
            ZoomError::Device(msg) => write!(f, "Zoom device error: {}", msg),
            ZoomError::ActorStopped => write!(f, "Zoom controller stopped"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PermissionError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ZoomError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_source() {
        let err: AppError = BackendError::DeviceNotFound("/dev/video3".into()).into();
        assert_eq!(err.to_string(), "Camera error: Device not found: /dev/video3");
    }

    #[test]
    fn test_io_error_is_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(AppError::from(io), AppError::Storage(_)));
    }
}
