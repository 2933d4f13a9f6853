//! Edge-density raw scoring.
//!
//! Global edge density is used as a cheap, tone-agnostic proxy for wrinkle
//! severity: more remaining edge magnitude after lip suppression means a
//! lower raw score.

use image::{GrayImage, RgbImage};
use imageproc::edges::canny;

/// Computes the Canny edge map of an image.
#[must_use]
pub fn edge_map(image: &RgbImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    canny(&gray, low_threshold, high_threshold)
}

/// Zeroes edge pixels wherever the mask is set.
pub fn suppress_masked(edges: &mut GrayImage, mask: &GrayImage) {
    debug_assert_eq!(edges.dimensions(), mask.dimensions());
    for (edge, masked) in edges.pixels_mut().zip(mask.pixels()) {
        if masked.0[0] == 255 {
            edge.0[0] = 0;
        }
    }
}

/// Derives the raw score from an edge map.
///
/// Sums remaining edge magnitude, normalizes by pixel count, and inverts
/// from 100. The result is nominally in [0,100] but goes far negative for
/// edge-saturated images; `normalize_score` bounds everything reported.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn raw_score(edges: &GrayImage) -> f64 {
    let (width, height) = edges.dimensions();
    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return 100.0;
    }
    let edge_sum: u64 = edges.pixels().map(|p| u64::from(p.0[0])).sum();
    100.0 - (edge_sum as f64 / total as f64) * 100.0
}
