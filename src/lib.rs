// SPDX-License-Identifier: GPL-3.0-only

//! Barcode Camera - a live camera barcode scanner
//!
//! Camera access is requested once; when granted the camera is bound and
//! every captured frame is handed to a barcode decoder. A decoded symbol
//! zooms the camera to 2.0x, a frame without one returns it to 1.0x.
//!
//! # Architecture
//!
//! - [`permission`]: one-shot camera permission gate (XDG portal or device check)
//! - [`backends`]: V4L2 enumeration, GStreamer capture pipeline, zoom control
//! - [`frame_processor`]: keep-only-latest frame slot, decoder, analysis loop
//! - [`session`]: permission → bind → analyze → shutdown
//! - [`terminal`]: terminal preview
//! - [`config`]: user configuration handling

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod permission;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use frame_processor::{DecodedSymbol, FrameAnalyzer, SymbolFormat};
pub use session::{ScanSession, SessionOutcome};
