// SPDX-License-Identifier: GPL-3.0-only

//! Backend layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: device enumeration, capture pipeline and zoom control
//! - [`file_source`]: still images delivered as camera frames

pub mod camera;
pub mod file_source;
