//! Brightness normalization.
//!
//! Equalizes the luminance channel of a YCbCr decomposition while leaving
//! chrominance untouched, so edge density is comparable across images taken
//! under different lighting.

use image::{DynamicImage, GrayImage, RgbImage};

/// 256-bin histogram of luminance values.
#[derive(Debug, Clone)]
pub struct LumaHistogram {
    bins: [u64; 256],
    total: u64,
}

impl LumaHistogram {
    /// Computes the histogram of a grayscale image.
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        let mut bins = [0u64; 256];
        for pixel in image.pixels() {
            bins[usize::from(pixel.0[0])] += 1;
        }
        let total = bins.iter().sum();
        Self { bins, total }
    }

    /// Returns the total pixel count.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Returns the per-bin counts.
    #[must_use]
    pub const fn bins(&self) -> &[u64; 256] {
        &self.bins
    }

    /// Cumulative count at the first occupied bin.
    #[must_use]
    pub fn first_occupied_count(&self) -> u64 {
        self.bins.iter().copied().find(|&count| count > 0).unwrap_or(0)
    }
}

/// Builds the histogram-equalization lookup table.
///
/// Standard CDF remapping. Degenerate histograms (empty, or a single
/// occupied bin) get the identity table so single-tone images pass through
/// unchanged.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
#[must_use]
pub fn equalization_lut(hist: &LumaHistogram) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let total = hist.total();
    let cdf_min = hist.first_occupied_count();

    if total == 0 || total == cdf_min {
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return lut;
    }

    let denom = (total - cdf_min) as f64;
    let mut cumulative = 0u64;
    for (i, &count) in hist.bins().iter().enumerate() {
        cumulative += count;
        let scaled = cumulative.saturating_sub(cdf_min) as f64 / denom * 255.0;
        lut[i] = scaled.round() as u8;
    }
    lut
}

/// Normalizes image brightness via luminance equalization.
///
/// Converts to YCbCr, equalizes Y only, recombines with the original
/// chrominance planes, and converts back. Output dimensions match the input.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn normalize_brightness(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width as usize) * (height as usize));

    for (src, dst) in rgb.pixels().zip(luma.pixels_mut()) {
        let [r, g, b] = src.0;
        let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
        dst.0[0] = y;
        chroma.push((cb, cr));
    }

    let lut = equalization_lut(&LumaHistogram::from_luma(&luma));

    let mut out = RgbImage::new(width, height);
    for ((dst, y_px), &(cb, cr)) in out.pixels_mut().zip(luma.pixels()).zip(chroma.iter()) {
        let y = f32::from(lut[usize::from(y_px.0[0])]);
        dst.0 = ycbcr_to_rgb(y, cb, cr);
    }
    out
}

/// RGB to YCbCr (JFIF full-range coefficients).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, f32, f32) {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y.round().clamp(0.0, 255.0) as u8, cb, cr)
}

/// YCbCr back to RGB, clamped to valid channel range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_dimensions_preserved() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(37, 23));
        let out = normalize_brightness(&img);
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn test_uniform_image_unchanged() {
        // A single-tone image has a degenerate histogram; equalization must
        // leave it alone rather than blowing it out to white.
        let img = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let out = normalize_brightness(&DynamicImage::ImageRgb8(img));
        for pixel in out.pixels() {
            assert_eq!(pixel.0, [128, 128, 128]);
        }
    }

    #[test]
    fn test_gradient_contrast_expanded() {
        // A narrow 50..=200 ramp should stretch to cover the full range.
        let img = RgbImage::from_fn(150, 4, |x, _| {
            let v = (50 + x) as u8;
            Rgb([v, v, v])
        });
        let out = normalize_brightness(&DynamicImage::ImageRgb8(img));

        let hist = LumaHistogram::from_luma(&image::imageops::grayscale(&out));
        let min = hist.bins().iter().position(|&c| c > 0).unwrap_or(255);
        let max = hist.bins().iter().rposition(|&c| c > 0).unwrap_or(0);
        assert!(min < 10, "darkest tone should map near 0, got {min}");
        assert!(max > 245, "brightest tone should map near 255, got {max}");
    }

    #[test]
    fn test_gray_input_stays_gray() {
        // Chrominance is untouched, so neutral pixels stay neutral.
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let v = ((x + y) % 200) as u8 + 20;
            Rgb([v, v, v])
        });
        let out = normalize_brightness(&DynamicImage::ImageRgb8(img));
        for pixel in out.pixels() {
            let [r, g, b] = pixel.0;
            assert!(
                r.abs_diff(g) <= 2 && g.abs_diff(b) <= 2,
                "gray pixel drifted: {:?}",
                pixel.0
            );
        }
    }

    #[test]
    fn test_lut_monotonic() {
        let img = GrayImage::from_fn(256, 2, |x, _| image::Luma([x as u8]));
        let lut = equalization_lut(&LumaHistogram::from_luma(&img));
        for window in lut.windows(2) {
            assert!(window[0] <= window[1], "LUT must be monotonic");
        }
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_empty_histogram_identity_lut() {
        let hist = LumaHistogram::from_luma(&GrayImage::new(0, 0));
        let lut = equalization_lut(&hist);
        for (i, &v) in lut.iter().enumerate() {
            assert_eq!(usize::from(v), i);
        }
    }
}
