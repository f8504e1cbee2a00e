// SPDX-License-Identifier: GPL-3.0-only

//! QR code reader backed by rqrr

use crate::frame_processor::types::{DecodedSymbol, FrameRegion, SymbolFormat};
use image::GrayImage;
use tracing::{debug, trace};

/// Locate and decode QR grids in a grayscale image
///
/// Candidates that fail to decode are skipped. Stops at the first decoded
/// grid unless `search_all_regions` is set.
pub fn read(luma: &GrayImage, search_all_regions: bool) -> Vec<DecodedSymbol> {
    let start = std::time::Instant::now();
    let (width, height) = luma.dimensions();

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

    let grids = prepared.detect_grids();
    trace!(
        candidates = grids.len(),
        detect_ms = start.elapsed().as_millis(),
        "QR candidate search complete"
    );

    let mut symbols = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR candidate");
                continue;
            }
        };

        let corners: Vec<(i32, i32)> = grid.bounds.iter().map(|p| (p.x, p.y)).collect();
        symbols.push(DecodedSymbol {
            display_value: content,
            format: SymbolFormat::QrCode,
            bounds: FrameRegion::from_corners(&corners, width, height),
        });

        if !search_all_regions {
            break;
        }
    }

    symbols
}
