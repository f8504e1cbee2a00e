// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame analysis results
//!
//! These are the values a decoder hands back to the analysis loop.

use serde::{Deserialize, Serialize};

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so they stay valid when the decoder worked on a downscaled copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Bounding box of a set of pixel-space corner points
    ///
    /// Points are clamped to the frame before normalising.
    pub fn from_corners(corners: &[(i32, i32)], frame_width: u32, frame_height: u32) -> Option<Self> {
        if corners.is_empty() || frame_width == 0 || frame_height == 0 {
            return None;
        }

        let max_x = frame_width as i32;
        let max_y = frame_height as i32;
        let clamp = |&(x, y): &(i32, i32)| (x.clamp(0, max_x), y.clamp(0, max_y));

        let (mut left, mut top) = clamp(&corners[0]);
        let (mut right, mut bottom) = (left, top);
        for corner in &corners[1..] {
            let (x, y) = clamp(corner);
            left = left.min(x);
            right = right.max(x);
            top = top.min(y);
            bottom = bottom.max(y);
        }

        Some(Self {
            x: left as f32 / frame_width as f32,
            y: top as f32 / frame_height as f32,
            width: (right - left) as f32 / frame_width as f32,
            height: (bottom - top) as f32 / frame_height as f32,
        })
    }
}

/// Barcode symbology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolFormat {
    QrCode,
    Aztec,
    UpcA,
    UpcE,
    Ean8,
    Ean13,
    Pdf417,
    DataMatrix,
    Code39,
    Code93,
    Code128,
    Codabar,
    Itf,
}

impl SymbolFormat {
    /// Every symbology the scanner asks for
    pub const ALL: [SymbolFormat; 13] = [
        SymbolFormat::QrCode,
        SymbolFormat::Aztec,
        SymbolFormat::UpcA,
        SymbolFormat::UpcE,
        SymbolFormat::Ean8,
        SymbolFormat::Ean13,
        SymbolFormat::Pdf417,
        SymbolFormat::DataMatrix,
        SymbolFormat::Code39,
        SymbolFormat::Code93,
        SymbolFormat::Code128,
        SymbolFormat::Codabar,
        SymbolFormat::Itf,
    ];

    /// Get display name for the symbology
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::QrCode => "QR Code",
            Self::Aztec => "Aztec",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Ean8 => "EAN-8",
            Self::Ean13 => "EAN-13",
            Self::Pdf417 => "PDF417",
            Self::DataMatrix => "Data Matrix",
            Self::Code39 => "Code 39",
            Self::Code93 => "Code 93",
            Self::Code128 => "Code 128",
            Self::Codabar => "Codabar",
            Self::Itf => "ITF",
        }
    }
}

impl std::fmt::Display for SymbolFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    /// Text payload
    pub display_value: String,
    /// Symbology the payload was read from
    pub format: SymbolFormat,
    /// Location in the frame, if the decoder reports one
    pub bounds: Option<FrameRegion>,
}

impl DecodedSymbol {
    /// Create a symbol without location information
    pub fn new(format: SymbolFormat, display_value: impl Into<String>) -> Self {
        Self {
            display_value: display_value.into(),
            format,
            bounds: None,
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Symbologies to look for
    pub formats: Vec<SymbolFormat>,
    /// Decode every candidate region instead of stopping at the first hit
    pub search_all_regions: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            formats: SymbolFormat::ALL.to_vec(),
            search_all_regions: true,
        }
    }
}

impl DecoderOptions {
    /// Check whether a symbology was requested
    pub fn wants(&self, format: SymbolFormat) -> bool {
        self.formats.contains(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_region_from_corners() {
        let region =
            FrameRegion::from_corners(&[(100, 50), (300, 50), (300, 150), (100, 150)], 1000, 500)
                .unwrap();
        assert!((region.x - 0.1).abs() < 0.001);
        assert!((region.y - 0.1).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
        assert!((region.height - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_frame_region_clamps_to_frame() {
        let region = FrameRegion::from_corners(&[(-20, -20), (120, 80)], 100, 100).unwrap();
        assert_eq!(region.x, 0.0);
        assert_eq!(region.width, 1.0);
        assert!((region.height - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_frame_region_empty() {
        assert!(FrameRegion::from_corners(&[], 100, 100).is_none());
    }

    #[test]
    fn test_default_options_request_all_formats() {
        let options = DecoderOptions::default();
        assert_eq!(options.formats.len(), 13);
        assert!(options.search_all_regions);
        assert!(options.wants(SymbolFormat::Itf));
    }

    #[test]
    fn test_format_serde_names() {
        let json = serde_json::to_string(&SymbolFormat::DataMatrix).unwrap();
        assert_eq!(json, "\"data_matrix\"");
        let parsed: SymbolFormat = serde_json::from_str("\"ean13\"").unwrap();
        assert_eq!(parsed, SymbolFormat::Ean13);
    }
}
