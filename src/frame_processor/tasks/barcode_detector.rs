// SPDX-License-Identifier: GPL-3.0-only

//! Barcode detection task
//!
//! QR codes are read with rqrr, every other symbology with rxing, and the
//! two result lists are merged. Decoding is CPU-bound and runs on tokio's
//! blocking pool so the analysis executor keeps running while a frame is
//! being searched.

use super::{BarcodeDecoder, qr_reader, symbology_reader};
use crate::errors::DecodeError;
use crate::frame_processor::input_image::InputImage;
use crate::frame_processor::types::{DecodedSymbol, DecoderOptions, SymbolFormat};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decoder for every [`SymbolFormat`]
#[derive(Debug, Clone)]
pub struct MultiFormatDecoder {
    options: Arc<DecoderOptions>,
}

impl Default for MultiFormatDecoder {
    fn default() -> Self {
        Self::new(DecoderOptions::default())
    }
}

impl MultiFormatDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        if options.formats.is_empty() {
            warn!("No symbologies requested; decoder will never report a symbol");
        }

        debug!(
            formats = options.formats.len(),
            search_all_regions = options.search_all_regions,
            "Barcode decoder configured"
        );

        Self {
            options: Arc::new(options),
        }
    }
}

impl BarcodeDecoder for MultiFormatDecoder {
    fn process(
        &self,
        image: InputImage,
    ) -> impl Future<Output = Result<Vec<DecodedSymbol>, DecodeError>> + Send + 'static {
        let options = Arc::clone(&self.options);
        let task = tokio::task::spawn_blocking(move || decode_sync(&image, &options));

        async move {
            task.await
                .map_err(|e| DecodeError::Panicked(e.to_string()))?
        }
    }
}

/// Synchronous decode (runs in blocking task)
pub fn decode_sync(
    image: &InputImage,
    options: &DecoderOptions,
) -> Result<Vec<DecodedSymbol>, DecodeError> {
    let start = std::time::Instant::now();
    let luma = image.luma();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidImage("empty image".to_string()));
    }

    let mut symbols = if options.wants(SymbolFormat::QrCode) {
        qr_reader::read(luma, options.search_all_regions)
    } else {
        Vec::new()
    };

    if symbols.is_empty() || options.search_all_regions {
        symbols.extend(symbology_reader::read(
            luma,
            &options.formats,
            options.search_all_regions,
        )?);
    }

    if !symbols.is_empty() {
        debug!(
            count = symbols.len(),
            total_ms = start.elapsed().as_millis(),
            "Decoder found symbols"
        );
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_blank_image_has_no_symbols() {
        let image = InputImage::from_gray(GrayImage::from_pixel(64, 64, image::Luma([255])));
        let symbols = decode_sync(&image, &DecoderOptions::default()).unwrap();
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_nothing_requested_short_circuits() {
        let options = DecoderOptions {
            formats: Vec::new(),
            ..DecoderOptions::default()
        };
        let image = InputImage::from_gray(GrayImage::new(8, 8));
        assert!(decode_sync(&image, &options).unwrap().is_empty());
    }

    #[test]
    fn test_zero_sized_image_is_invalid() {
        let image = InputImage::from_gray(GrayImage::new(0, 0));
        let err = decode_sync(&image, &DecoderOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn test_process_resolves_on_blocking_pool() {
        let decoder = MultiFormatDecoder::default();
        let image = InputImage::from_gray(GrayImage::from_pixel(32, 32, image::Luma([0])));
        let result = decoder.process(image).await;
        assert_eq!(result, Ok(Vec::new()));
    }
}
