// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Zoom ratios written by the analysis loop
///
/// Only these two values are ever applied.
pub mod zoom {
    /// No symbol in view
    pub const ZOOM_NEUTRAL: f32 = 1.0;

    /// At least one symbol decoded
    pub const ZOOM_FOUND: f32 = 2.0;

    /// V4L2 ZOOM_ABSOLUTE units per 1.0x of ratio (UVC convention: 100 = 1.0x)
    pub const V4L2_UNITS_PER_RATIO: i32 = 100;

    /// Ratio assumed at the top of a zoom control narrower than one ratio step
    pub const NARROW_RANGE_MAX_RATIO: f32 = 4.0;
}

/// Analysis stream defaults
pub mod analysis {
    /// Target analysis width
    pub const TARGET_WIDTH: u32 = 1280;

    /// Target analysis height
    pub const TARGET_HEIGHT: u32 = 720;

    /// Frames larger than this on either axis are downscaled before decoding
    pub const MAX_DECODE_DIMENSION: u32 = 1280;

    /// Decodes allowed to run at once unless configured otherwise
    pub const DEFAULT_IN_FLIGHT_DECODES: usize = 2;

    /// Upper bound for concurrent decodes
    pub const MAX_IN_FLIGHT_DECODES: usize = 64;
}

/// GStreamer pipeline configuration
pub mod pipeline {
    /// Appsink queue depth; one buffer gives keep-only-latest behaviour
    pub const MAX_BUFFERS: u32 = 1;

    /// Output format requested from videoconvert
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Preview channel depth (frames beyond this are dropped)
    pub const PREVIEW_CHANNEL_DEPTH: usize = 2;
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline stop timeout
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline start timeout
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Terminal redraw interval
    pub const PREVIEW_REFRESH: Duration = Duration::from_millis(33);

    /// How long the portal dialog may stay open before the request is abandoned
    pub const PORTAL_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);
}

/// File format constants
pub mod file_formats {
    /// Image extensions accepted by the decode command
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if an extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    use std::path::Path;

    /// Application identifier used for config and cache directories
    pub const APP_ID: &str = "barcode-camera";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Check if the application is running inside a Flatpak sandbox
    pub fn is_flatpak() -> bool {
        Path::new("/.flatpak-info").exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension_case_insensitive() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(file_formats::is_image_extension("jpeg"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
