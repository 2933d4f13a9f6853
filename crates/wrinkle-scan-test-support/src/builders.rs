//! Synthetic image builders for testing.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

/// Builder for creating synthetic test images.
///
/// Provides convenience methods for generating images with specific
/// characteristics (smooth, edge-rich, face-like).
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Creates a uniform gray image (no edges at all).
    #[must_use]
    pub fn uniform_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |_, _| Luma([value]));
        DynamicImage::ImageLuma8(img)
    }

    /// Creates a high-contrast checkerboard pattern (very sharp edges).
    #[must_use]
    pub fn checkerboard(width: u32, height: u32, cell_size: u32) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, y| {
            if (x / cell_size + y / cell_size) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    /// Creates vertical bars (sharp edges at regular intervals).
    #[must_use]
    pub fn vertical_bars(width: u32, height: u32, bar_width: u32) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, _| {
            if (x / bar_width) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    /// Creates a smooth skin-toned image with a soft oval highlight, loosely
    /// resembling a framed portrait. Decodes fine and scores cleanly but
    /// carries no detectable landmarks.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn face_like(width: u32, height: u32) -> DynamicImage {
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let rx = width as f32 * 0.3;
        let ry = height as f32 * 0.4;

        let img = RgbImage::from_fn(width, height, |x, y| {
            let dx = (x as f32 - cx) / rx;
            let dy = (y as f32 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                Rgb([210, 170, 140])
            } else {
                Rgb([60, 70, 90])
            }
        });
        DynamicImage::ImageRgb8(img)
    }
}

/// Encodes an image as JPEG bytes, for building multipart upload bodies.
///
/// # Panics
///
/// Panics if encoding fails (test-only helper).
#[must_use]
#[allow(clippy::expect_used)]
pub fn jpeg_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .to_rgb8()
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .expect("JPEG encoding should not fail");
    buffer.into_inner()
}

/// Encodes an image as PNG bytes.
///
/// # Panics
///
/// Panics if encoding fails (test-only helper).
#[must_use]
#[allow(clippy::expect_used)]
pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("PNG encoding should not fail");
    buffer.into_inner()
}
