// SPDX-License-Identifier: GPL-3.0-only

//! Linear and 2D symbology reader backed by rxing
//!
//! Covers everything except QR: the UPC/EAN family, Code 39/93/128,
//! Codabar, ITF, Aztec, PDF417 and Data Matrix.

use crate::errors::DecodeError;
use crate::frame_processor::types::{DecodedSymbol, FrameRegion, SymbolFormat};
use image::GrayImage;
use rxing::{BarcodeFormat, DecodeHintValue, DecodeHints, Exceptions, RXingResult};
use std::collections::HashSet;
use tracing::{debug, trace};

/// rxing format for a symbology this reader handles
///
/// QR is read by rqrr and has no mapping here.
pub fn rxing_format(format: SymbolFormat) -> Option<BarcodeFormat> {
    match format {
        SymbolFormat::QrCode => None,
        SymbolFormat::Aztec => Some(BarcodeFormat::AZTEC),
        SymbolFormat::UpcA => Some(BarcodeFormat::UPC_A),
        SymbolFormat::UpcE => Some(BarcodeFormat::UPC_E),
        SymbolFormat::Ean8 => Some(BarcodeFormat::EAN_8),
        SymbolFormat::Ean13 => Some(BarcodeFormat::EAN_13),
        SymbolFormat::Pdf417 => Some(BarcodeFormat::PDF_417),
        SymbolFormat::DataMatrix => Some(BarcodeFormat::DATA_MATRIX),
        SymbolFormat::Code39 => Some(BarcodeFormat::CODE_39),
        SymbolFormat::Code93 => Some(BarcodeFormat::CODE_93),
        SymbolFormat::Code128 => Some(BarcodeFormat::CODE_128),
        SymbolFormat::Codabar => Some(BarcodeFormat::CODABAR),
        SymbolFormat::Itf => Some(BarcodeFormat::ITF),
    }
}

fn symbol_format(format: &BarcodeFormat) -> Option<SymbolFormat> {
    match format {
        BarcodeFormat::AZTEC => Some(SymbolFormat::Aztec),
        BarcodeFormat::UPC_A => Some(SymbolFormat::UpcA),
        BarcodeFormat::UPC_E => Some(SymbolFormat::UpcE),
        BarcodeFormat::EAN_8 => Some(SymbolFormat::Ean8),
        BarcodeFormat::EAN_13 => Some(SymbolFormat::Ean13),
        BarcodeFormat::PDF_417 => Some(SymbolFormat::Pdf417),
        BarcodeFormat::DATA_MATRIX => Some(SymbolFormat::DataMatrix),
        BarcodeFormat::CODE_39 => Some(SymbolFormat::Code39),
        BarcodeFormat::CODE_93 => Some(SymbolFormat::Code93),
        BarcodeFormat::CODE_128 => Some(SymbolFormat::Code128),
        BarcodeFormat::CODABAR => Some(SymbolFormat::Codabar),
        BarcodeFormat::ITF => Some(SymbolFormat::Itf),
        BarcodeFormat::QR_CODE => Some(SymbolFormat::QrCode),
        _ => None,
    }
}

/// Decode the requested non-QR symbologies
///
/// With `search_all_regions` the multi-barcode reader scans the whole image;
/// otherwise decoding stops at the first symbol. "Nothing here" answers from
/// rxing (not found, bad checksum, malformed candidate) are an empty result.
pub fn read(
    luma: &GrayImage,
    formats: &[SymbolFormat],
    search_all_regions: bool,
) -> Result<Vec<DecodedSymbol>, DecodeError> {
    let wanted: HashSet<BarcodeFormat> = formats.iter().filter_map(|f| rxing_format(*f)).collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let start = std::time::Instant::now();
    let (width, height) = luma.dimensions();
    let mut hints = DecodeHints::default()
        .with(DecodeHintValue::PossibleFormats(wanted))
        .with(DecodeHintValue::TryHarder(true));

    let results = if search_all_regions {
        rxing::helpers::detect_multiple_in_luma_with_hints(
            luma.as_raw().clone(),
            width,
            height,
            &mut hints,
        )
    } else {
        rxing::helpers::detect_in_luma_with_hints(
            luma.as_raw().clone(),
            width,
            height,
            None,
            &mut hints,
        )
        .map(|result| vec![result])
    };

    let results = match results {
        Ok(results) => results,
        Err(
            Exceptions::NotFoundException(_)
            | Exceptions::ChecksumException(_)
            | Exceptions::FormatException(_),
        ) => {
            trace!(search_ms = start.elapsed().as_millis(), "No symbols found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(DecodeError::Decoder(format!("{:?}", e))),
    };

    Ok(results
        .iter()
        .filter_map(|result| to_symbol(result, width, height))
        .collect())
}

fn to_symbol(result: &RXingResult, width: u32, height: u32) -> Option<DecodedSymbol> {
    let Some(format) = symbol_format(result.getBarcodeFormat()) else {
        debug!(format = ?result.getBarcodeFormat(), "Ignoring unmapped symbology");
        return None;
    };

    let corners: Vec<(i32, i32)> = result
        .getPoints()
        .iter()
        .map(|p| (p.x.round() as i32, p.y.round() as i32))
        .collect();

    Some(DecodedSymbol {
        display_value: result.getText().to_string(),
        format,
        bounds: FrameRegion::from_corners(&corners, width, height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_but_qr_maps_both_ways() {
        for format in SymbolFormat::ALL {
            match rxing_format(format) {
                Some(rx) => assert_eq!(symbol_format(&rx), Some(format)),
                None => assert_eq!(format, SymbolFormat::QrCode),
            }
        }
    }

    #[test]
    fn test_qr_only_request_skips_search() {
        let image = GrayImage::new(8, 8);
        let symbols = read(&image, &[SymbolFormat::QrCode], true).unwrap();
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_blank_image_is_empty_not_error() {
        let image = GrayImage::from_pixel(120, 60, image::Luma([255]));
        assert_eq!(read(&image, &SymbolFormat::ALL, true), Ok(Vec::new()));
        assert_eq!(read(&image, &SymbolFormat::ALL, false), Ok(Vec::new()));
    }
}
