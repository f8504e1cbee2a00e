// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use barcode_camera::constants::{analysis, app_info, pipeline, zoom};

#[test]
fn test_zoom_levels() {
    assert_eq!(zoom::ZOOM_NEUTRAL, 1.0);
    assert_eq!(zoom::ZOOM_FOUND, 2.0);
}

#[test]
fn test_analysis_target_resolution() {
    assert_eq!((analysis::TARGET_WIDTH, analysis::TARGET_HEIGHT), (1280, 720));
}

#[test]
fn test_appsink_keeps_only_latest() {
    assert_eq!(pipeline::MAX_BUFFERS, 1);
}

#[test]
fn test_version_is_set() {
    assert!(!app_info::version().is_empty());
    assert!(!app_info::APP_ID.is_empty());
}
