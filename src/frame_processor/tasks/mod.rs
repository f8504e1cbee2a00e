// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! This module contains the decoder abstraction and its implementations.

pub mod barcode_detector;
pub mod qr_reader;
pub mod symbology_reader;

pub use barcode_detector::MultiFormatDecoder;

use super::input_image::InputImage;
use super::types::DecodedSymbol;
use crate::errors::DecodeError;
use std::future::Future;

/// Asynchronous barcode decoder
///
/// `process` starts the decode as soon as it is called. The returned future
/// resolves to exactly one of the two outcomes: the symbols found (possibly
/// none) or an error. It owns everything it needs, so the caller may release
/// the source frame before awaiting it.
pub trait BarcodeDecoder: Send + Sync + 'static {
    fn process(
        &self,
        image: InputImage,
    ) -> impl Future<Output = Result<Vec<DecodedSymbol>, DecodeError>> + Send + 'static;
}
