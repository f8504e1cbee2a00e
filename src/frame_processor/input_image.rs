// SPDX-License-Identifier: GPL-3.0-only

//! Decoder input preparation
//!
//! Turns a camera frame into an owned, upright, grayscale image. The copy is
//! what lets the analysis loop release the frame before the decode finishes.

use crate::backends::camera::types::{CameraFrame, PixelFormat, SensorRotation};
use crate::errors::DecodeError;
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::trace;

/// Owned grayscale image handed to a decoder
#[derive(Debug, Clone)]
pub struct InputImage {
    luma: GrayImage,
    rotation: SensorRotation,
}

impl InputImage {
    /// Extract luma from a frame, downscale to `max_dimension` and rotate upright
    pub fn from_frame(
        frame: &CameraFrame,
        rotation: SensorRotation,
        max_dimension: u32,
    ) -> Result<Self, DecodeError> {
        let start = std::time::Instant::now();

        validate_layout(frame)?;
        let luma = extract_luma(frame)?;
        let luma = GrayImage::from_raw(frame.width, frame.height, luma).ok_or_else(|| {
            DecodeError::InvalidImage(format!(
                "luma buffer does not match {}x{}",
                frame.width, frame.height
            ))
        })?;

        let luma = downscale(luma, max_dimension);

        let luma = match rotation {
            SensorRotation::None => luma,
            SensorRotation::Rotate90 => imageops::rotate90(&luma),
            SensorRotation::Rotate180 => imageops::rotate180(&luma),
            SensorRotation::Rotate270 => imageops::rotate270(&luma),
        };

        trace!(
            width = luma.width(),
            height = luma.height(),
            %rotation,
            prepare_us = start.elapsed().as_micros(),
            "Prepared decoder input"
        );

        Ok(Self { luma, rotation })
    }

    /// Wrap an already upright grayscale image
    pub fn from_gray(luma: GrayImage) -> Self {
        Self {
            luma,
            rotation: SensorRotation::None,
        }
    }

    pub fn width(&self) -> u32 {
        self.luma.width()
    }

    pub fn height(&self) -> u32 {
        self.luma.height()
    }

    /// Rotation that was applied to make the image upright
    pub fn rotation(&self) -> SensorRotation {
        self.rotation
    }

    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }
}

fn validate_layout(frame: &CameraFrame) -> Result<(), DecodeError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(DecodeError::InvalidImage(format!(
            "empty frame {}x{}",
            frame.width, frame.height
        )));
    }

    let row_bytes = frame.width as usize * frame.format.primary_plane_bytes_per_pixel() as usize;
    let stride = frame.stride as usize;
    if stride < row_bytes {
        return Err(DecodeError::InvalidImage(format!(
            "stride {} shorter than row of {} bytes",
            stride, row_bytes
        )));
    }

    let needed = stride * (frame.height as usize - 1) + row_bytes;
    if frame.data.len() < needed {
        return Err(DecodeError::InvalidImage(format!(
            "frame holds {} bytes, {} needed",
            frame.data.len(),
            needed
        )));
    }

    Ok(())
}

/// Copy the luma channel out of a frame, dropping stride padding
fn extract_luma(frame: &CameraFrame) -> Result<Vec<u8>, DecodeError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let data: &[u8] = &frame.data;

    let mut luma = Vec::with_capacity(width * height);

    match frame.format {
        // Planar and semi-planar YUV start with a full resolution Y plane
        PixelFormat::Gray8 | PixelFormat::NV12 | PixelFormat::I420 => {
            for y in 0..height {
                let row = y * stride;
                luma.extend_from_slice(&data[row..row + width]);
            }
        }
        PixelFormat::YUYV => {
            for y in 0..height {
                let row = &data[y * stride..y * stride + width * 2];
                luma.extend(row.iter().step_by(2));
            }
        }
        PixelFormat::RGBA | PixelFormat::RGB24 => {
            let bpp = frame.format.primary_plane_bytes_per_pixel() as usize;
            for y in 0..height {
                let row = &data[y * stride..y * stride + width * bpp];
                luma.extend(row.chunks_exact(bpp).map(|px| rgb_to_luma(px[0], px[1], px[2])));
            }
        }
    }

    if luma.len() != width * height {
        return Err(DecodeError::Unsupported(format!(
            "{:?} frame produced {} luma samples",
            frame.format,
            luma.len()
        )));
    }

    Ok(luma)
}

/// BT.601 luma
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

fn downscale(luma: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = luma.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return luma;
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);

    imageops::resize(&luma, new_width, new_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FrameData;
    use std::time::Instant;

    #[test]
    fn test_rgba_with_stride_padding() {
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // white
            0, 0, 0, 255, // black
            9, 9, // stride padding
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            9, 9, // stride padding
        ];
        let frame = CameraFrame {
            width: 2,
            height: 2,
            data: FrameData::from(data),
            format: PixelFormat::RGBA,
            stride: 10,
            captured_at: Instant::now(),
        };

        let input = InputImage::from_frame(&frame, SensorRotation::None, 0).unwrap();
        assert_eq!(input.luma().as_raw(), &vec![255, 0, 76, 149]);
    }

    #[test]
    fn test_yuyv_takes_every_other_byte() {
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: FrameData::from(vec![10, 128, 20, 128]),
            format: PixelFormat::YUYV,
            stride: 4,
            captured_at: Instant::now(),
        };
        let input = InputImage::from_frame(&frame, SensorRotation::None, 0).unwrap();
        assert_eq!(input.luma().as_raw(), &vec![10, 20]);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let frame = CameraFrame::from_gray(4, 2, vec![0; 8]);
        let input = InputImage::from_frame(&frame, SensorRotation::Rotate90, 0).unwrap();
        assert_eq!((input.width(), input.height()), (2, 4));
        assert_eq!(input.rotation(), SensorRotation::Rotate90);
    }

    #[test]
    fn test_rotate180_moves_pixels() {
        let frame = CameraFrame::from_gray(2, 1, vec![1, 2]);
        let input = InputImage::from_frame(&frame, SensorRotation::Rotate180, 0).unwrap();
        assert_eq!(input.luma().as_raw(), &vec![2, 1]);
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let frame = CameraFrame::from_gray(1280, 720, vec![128; 1280 * 720]);
        let input = InputImage::from_frame(&frame, SensorRotation::None, 640).unwrap();
        assert_eq!((input.width(), input.height()), (640, 360));
    }

    #[test]
    fn test_short_buffer_is_invalid() {
        let mut frame = CameraFrame::from_gray(4, 4, vec![0; 16]);
        frame.data = FrameData::from(vec![0; 10]);
        let err = InputImage::from_frame(&frame, SensorRotation::None, 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidImage(_)));
    }
}
