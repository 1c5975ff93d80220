//! Internal conversion helpers for the FFmpeg backend.
//!
//! Pixel-plane copying and rational-to-float conversion that do not belong
//! in any single public module.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;

/// Copy pixel data from a packed FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width * bpp).
/// The padding is stripped so the result can be handed to
/// `ImageBuffer::from_raw`. Returns `None` if the plane is smaller than
/// the requested geometry.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Option<Vec<u8>> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let rows = height as usize;
    let data = video_frame.data(0);

    if stride == row_length {
        return data.get(..row_length * rows).map(<[u8]>::to_vec);
    }

    let mut buffer = Vec::with_capacity(row_length * rows);
    for row in 0..rows {
        let row_start = row * stride;
        buffer.extend_from_slice(data.get(row_start..row_start + row_length)?);
    }
    Some(buffer)
}

/// Wrap a tightly-packed buffer in the `DynamicImage` variant matching
/// `pixel_format`.
pub(crate) fn buffer_to_image(
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Option<DynamicImage> {
    match pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, buffer).map(DynamicImage::ImageLuma8)
        }
    }
}

/// Frames per second from an FFmpeg rational, or `None` if undefined.
pub(crate) fn rational_to_frames_per_second(rate: Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}
