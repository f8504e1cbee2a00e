// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis
//!
//! Camera frames arrive through a [`LatestFrameSlot`], are turned into
//! decoder input and handed to a [`BarcodeDecoder`]. The decode result
//! drives the camera zoom through the zoom actor.
//!
//! ```text
//! appsink ─► LatestFrameSlot ─► FrameAnalyzer ─► BarcodeDecoder (blocking pool)
//!                 (depth 1)          │                   │
//!                                    └─ release frame    └─► zoom 1.0 / 2.0
//! ```

pub mod analyzer;
pub mod frame_handle;
pub mod input_image;
pub mod latest_frame;
pub mod tasks;
pub mod types;

pub use analyzer::{DecodeOutcome, FrameAnalyzer, StatsSnapshot};
pub use frame_handle::{FrameHandle, FrameRelease, ReleaseCounter};
pub use input_image::InputImage;
pub use latest_frame::LatestFrameSlot;
pub use tasks::{BarcodeDecoder, MultiFormatDecoder};
pub use types::{DecodedSymbol, DecoderOptions, FrameRegion, SymbolFormat};
