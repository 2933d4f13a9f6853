//! 68-point facial landmark regression.
//!
//! A small CNN regresses landmark coordinates from a grayscale face crop.
//! Landmark layout (standard 68-point model):
//!
//! - 0-16: jaw outline
//! - 17-21: right eyebrow
//! - 22-26: left eyebrow
//! - 27-35: nose
//! - 36-41: right eye
//! - 42-47: left eye
//! - 48-59: outer lip
//! - 60-67: inner lip

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};

/// Number of landmarks regressed.
pub const LANDMARK_COUNT: usize = 68;

/// Regressor input edge length.
pub const INPUT_SIZE: usize = 112;

/// Margin added around the detected face box before cropping, as a fraction
/// of the box size.
const CROP_MARGIN: f32 = 0.25;

/// A set of detected facial landmarks.
///
/// Points are `(x, y)` in normalized `[0,1]` coordinates of the full image.
#[derive(Debug, Clone)]
pub struct FaceLandmarks {
    points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    /// Creates a landmark set from normalized points.
    #[must_use]
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    /// Number of points in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the set holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns landmark `index` in normalized coordinates.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<(f32, f32)> {
        self.points.get(index).copied()
    }

    /// Projects landmark `index` into pixel space for a `width` x `height`
    /// raster.
    #[must_use]
    pub fn pixel(&self, index: usize, width: u32, height: u32) -> Option<(i32, i32)> {
        self.point(index)
            .map(|(x, y)| ((x * width as f32) as i32, (y * height as f32) as i32))
    }
}

/// 68-point landmark regressor.
///
/// Architecture: four conv/pool stages over a 112x112 grayscale crop,
/// followed by two FC layers emitting 136 crop-relative coordinates.
pub struct LandmarkNet {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    conv4: Conv2d,
    fc1: Linear,
    fc2: Linear,
    device: Device,
}

impl LandmarkNet {
    /// Creates a regressor from checkpoint weights.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or shaped wrong.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();

        let conv = |in_c, out_c, name: &str| {
            conv2d(
                in_c,
                out_c,
                3,
                Conv2dConfig {
                    padding: 1,
                    ..Conv2dConfig::default()
                },
                vb.pp(name),
            )
        };

        let conv1 = conv(1, 32, "conv1")?;
        let conv2 = conv(32, 64, "conv2")?;
        let conv3 = conv(64, 128, "conv3")?;
        let conv4 = conv(128, 256, "conv4")?;

        // Four 2x2 pools: 112 -> 56 -> 28 -> 14 -> 7.
        let fc1 = linear(256 * 7 * 7, 512, vb.pp("fc1"))?;
        let fc2 = linear(512, LANDMARK_COUNT * 2, vb.pp("fc2"))?;

        Ok(Self {
            conv1,
            conv2,
            conv3,
            conv4,
            fc1,
            fc2,
            device,
        })
    }

    /// Regresses landmarks for a face found at `face_bbox` (normalized
    /// corner-form coordinates) in `image`.
    ///
    /// The crop is grown by a fixed margin so the jaw and forehead stay in
    /// frame. Output points are mapped back to normalized full-image
    /// coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn detect(
        &self,
        image: &image::DynamicImage,
        face_bbox: &[f32; 4],
    ) -> Result<FaceLandmarks> {
        let img_w = image.width() as f32;
        let img_h = image.height() as f32;

        // Expand and clamp the crop window in normalized coordinates.
        let box_w = face_bbox[2] - face_bbox[0];
        let box_h = face_bbox[3] - face_bbox[1];
        let crop_x = (face_bbox[0] - box_w * CROP_MARGIN).clamp(0.0, 1.0);
        let crop_y = (face_bbox[1] - box_h * CROP_MARGIN).clamp(0.0, 1.0);
        let crop_w = ((face_bbox[2] + box_w * CROP_MARGIN).clamp(0.0, 1.0) - crop_x).max(0.0);
        let crop_h = ((face_bbox[3] + box_h * CROP_MARGIN).clamp(0.0, 1.0) - crop_y).max(0.0);

        let px = (crop_x * img_w) as u32;
        let py = (crop_y * img_h) as u32;
        let pw = ((crop_w * img_w) as u32).max(1).min(image.width().saturating_sub(px).max(1));
        let ph = ((crop_h * img_h) as u32).max(1).min(image.height().saturating_sub(py).max(1));

        let crop = image.crop_imm(px, py, pw, ph);
        let input = self.preprocess(&crop)?;
        let output = self.forward(&input)?;
        let coords = output.squeeze(0)?.to_vec1::<f32>()?;

        // Crop-relative coordinates back into full-image space.
        let points = coords
            .chunks_exact(2)
            .map(|pair| {
                let x = crop_x + pair[0].clamp(0.0, 1.0) * crop_w;
                let y = crop_y + pair[1].clamp(0.0, 1.0) * crop_h;
                (x, y)
            })
            .collect();

        Ok(FaceLandmarks::new(points))
    }

    /// Resizes and normalizes a face crop into the input tensor,
    /// `(1, 1, 112, 112)` in `[0, 1]`.
    fn preprocess(&self, crop: &image::DynamicImage) -> Result<Tensor> {
        let resized = crop.resize_exact(
            INPUT_SIZE as u32,
            INPUT_SIZE as u32,
            image::imageops::FilterType::Lanczos3,
        );
        let gray = resized.to_luma8();

        let data: Vec<f32> = gray.pixels().map(|p| f32::from(p[0]) / 255.0).collect();
        Tensor::from_vec(data, (1, 1, INPUT_SIZE, INPUT_SIZE), &self.device)
            .context("Failed to create landmark input tensor")
    }
}

impl Module for LandmarkNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(x)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = self.conv3.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = self.conv4.forward(&x)?.relu()?.max_pool2d(2)?;

        let x = x.flatten_from(1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        self.fc2.forward(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooling_dimensions() {
        // Verify the FC input size calculation: 112 -> 56 -> 28 -> 14 -> 7.
        assert_eq!(INPUT_SIZE / 2 / 2 / 2 / 2, 7);
    }

    #[test]
    fn test_landmarks_pixel_projection() {
        let landmarks = FaceLandmarks::new(vec![(0.5, 0.25), (1.0, 1.0)]);
        assert_eq!(landmarks.pixel(0, 200, 100), Some((100, 25)));
        assert_eq!(landmarks.pixel(1, 200, 100), Some((200, 100)));
    }

    #[test]
    fn test_landmarks_out_of_range_index() {
        let landmarks = FaceLandmarks::new(vec![(0.5, 0.5); LANDMARK_COUNT]);
        assert_eq!(landmarks.len(), LANDMARK_COUNT);
        assert!(landmarks.point(LANDMARK_COUNT).is_none());
        assert!(landmarks.pixel(LANDMARK_COUNT, 10, 10).is_none());
    }

    #[test]
    fn test_empty_landmarks() {
        let landmarks = FaceLandmarks::new(vec![]);
        assert!(landmarks.is_empty());
        assert!(landmarks.point(0).is_none());
    }
}
