//! Face detection.
//!
//! A BlazeFace-architecture detector (depthwise-separable CNN over a
//! 128x128 input with 896 anchors), using pretrained weights with BatchNorm
//! folded into convolution biases. The pipeline is configured for a single
//! static face, so detection collapses to the highest-scoring box after
//! non-maximum suppression.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::sigmoid;

/// Detector input edge length.
pub const INPUT_SIZE: usize = 128;

/// Total anchor boxes across both feature-map scales.
const NUM_ANCHORS: usize = 896;

/// Minimum confidence for a candidate detection.
const SCORE_THRESHOLD: f32 = 0.75;

/// IOU above which overlapping candidates are merged away.
const NMS_THRESHOLD: f32 = 0.3;

/// A detected face.
#[derive(Debug, Clone)]
pub struct FaceBox {
    /// Bounding box `[x_min, y_min, x_max, y_max]` in normalized `[0,1]`
    /// image coordinates.
    pub bbox: [f32; 4],
    /// Detection confidence.
    pub score: f32,
    /// Keypoints (right eye, left eye, nose, mouth, right ear, left ear),
    /// each `[x, y]` normalized.
    pub keypoints: [[f32; 2]; 6],
}

impl FaceBox {
    /// Returns the mouth keypoint `[x, y]`.
    #[must_use]
    pub const fn mouth(&self) -> [f32; 2] {
        self.keypoints[3]
    }

    /// Returns the box grown by `margin` (a fraction of its own size) on
    /// every side, clamped to the image.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> [f32; 4] {
        let w = self.bbox[2] - self.bbox[0];
        let h = self.bbox[3] - self.bbox[1];
        [
            (self.bbox[0] - w * margin).clamp(0.0, 1.0),
            (self.bbox[1] - h * margin).clamp(0.0, 1.0),
            (self.bbox[2] + w * margin).clamp(0.0, 1.0),
            (self.bbox[3] + h * margin).clamp(0.0, 1.0),
        ]
    }
}

/// Depthwise-separable convolution block with residual connection.
///
/// Biased convolutions, matching checkpoints with BatchNorm folded in.
struct DepthwiseBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    channel_pad: usize,
    stride: usize,
}

impl DepthwiseBlock {
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> Result<Self> {
        let padding = if stride == 2 {
            0
        } else {
            (kernel_size - 1) / 2
        };

        let depthwise = conv2d(
            in_channels,
            in_channels,
            kernel_size,
            Conv2dConfig {
                stride,
                padding,
                groups: in_channels,
                dilation: 1,
            },
            vb.pp("depthwise"),
        )?;

        let pointwise = conv2d(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;

        Ok(Self {
            depthwise,
            pointwise,
            channel_pad: out_channels.saturating_sub(in_channels),
            stride,
        })
    }
}

impl Module for DepthwiseBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        // Stride-2 blocks use asymmetric zero padding on the input.
        let padded = if self.stride == 2 {
            x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?
        } else {
            x.clone()
        };

        let h = self.depthwise.forward(&padded)?.relu()?;
        let h = self.pointwise.forward(&h)?;

        // Residual path: max-pool for spatial downsampling, zero-pad new
        // channels.
        let residual = if self.stride == 2 {
            x.max_pool2d(2)?
        } else {
            x.clone()
        };
        let residual = if self.channel_pad > 0 {
            residual.pad_with_zeros(1, 0, self.channel_pad)?
        } else {
            residual
        };

        (h + residual)?.relu()
    }
}

/// BlazeFace-architecture face detector.
pub struct FaceDetector {
    conv0: Conv2d,
    backbone1: Vec<DepthwiseBlock>,
    backbone2: Vec<DepthwiseBlock>,
    classifier_16: Conv2d,
    regressor_16: Conv2d,
    classifier_8: Conv2d,
    regressor_8: Conv2d,
    anchors: Tensor,
    device: Device,
}

impl FaceDetector {
    /// Creates a detector from checkpoint weights.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or shaped wrong.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();

        // Stem: 5x5 conv, 3 -> 24 channels, stride 2.
        let conv0 = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                padding: 0,
                ..Conv2dConfig::default()
            },
            vb.pp("conv0"),
        )?;

        // Backbone 1 ends at the 16x16 feature map (88 channels). The layer
        // table is fixed by the pretrained checkpoint.
        let backbone1_config = [
            (24, 24, 3, 1),
            (24, 28, 3, 1),
            (28, 32, 3, 2),
            (32, 36, 3, 1),
            (36, 42, 3, 1),
            (42, 48, 3, 2),
            (48, 56, 3, 1),
            (56, 64, 3, 1),
            (64, 72, 3, 1),
            (72, 80, 3, 1),
            (80, 88, 3, 1),
        ];
        let mut backbone1 = Vec::new();
        for (i, (in_c, out_c, k, s)) in backbone1_config.iter().enumerate() {
            backbone1.push(DepthwiseBlock::new(
                *in_c,
                *out_c,
                *k,
                *s,
                &vb.pp(format!("backbone1.{i}")),
            )?);
        }

        // Backbone 2 ends at the 8x8 feature map (96 channels).
        let backbone2_config = [
            (88, 96, 3, 2),
            (96, 96, 3, 1),
            (96, 96, 3, 1),
            (96, 96, 3, 1),
            (96, 96, 3, 1),
        ];
        let mut backbone2 = Vec::new();
        for (i, (in_c, out_c, k, s)) in backbone2_config.iter().enumerate() {
            backbone2.push(DepthwiseBlock::new(
                *in_c,
                *out_c,
                *k,
                *s,
                &vb.pp(format!("backbone2.{i}")),
            )?);
        }

        // Heads: 2 anchors per 16x16 location, 6 per 8x8 location.
        let classifier_16 = conv2d(88, 2, 1, Conv2dConfig::default(), vb.pp("classifier_16"))?;
        let regressor_16 = conv2d(88, 32, 1, Conv2dConfig::default(), vb.pp("regressor_16"))?;
        let classifier_8 = conv2d(96, 6, 1, Conv2dConfig::default(), vb.pp("classifier_8"))?;
        let regressor_8 = conv2d(96, 96, 1, Conv2dConfig::default(), vb.pp("regressor_8"))?;

        let anchors = Self::generate_anchors(&device)?;

        Ok(Self {
            conv0,
            backbone1,
            backbone2,
            classifier_16,
            regressor_16,
            classifier_8,
            regressor_8,
            anchors,
            device,
        })
    }

    /// Anchor centers for both feature-map scales, `(NUM_ANCHORS, 4)`.
    fn generate_anchors(device: &Device) -> Result<Tensor> {
        let mut anchors = Vec::with_capacity(NUM_ANCHORS * 4);

        for y in 0..16_u8 {
            for x in 0..16_u8 {
                for _ in 0..2 {
                    let cx = (f32::from(x) + 0.5) / 16.0;
                    let cy = (f32::from(y) + 0.5) / 16.0;
                    anchors.extend_from_slice(&[cx, cy, 1.0, 1.0]);
                }
            }
        }
        for y in 0..8_u8 {
            for x in 0..8_u8 {
                for _ in 0..6 {
                    let cx = (f32::from(x) + 0.5) / 8.0;
                    let cy = (f32::from(y) + 0.5) / 8.0;
                    anchors.extend_from_slice(&[cx, cy, 1.0, 1.0]);
                }
            }
        }

        Tensor::from_vec(anchors, (NUM_ANCHORS, 4), device).context("Failed to create anchors")
    }

    /// Resizes and normalizes an image into the detector's input tensor,
    /// `(1, 3, 128, 128)` in `[-1, 1]`.
    fn preprocess(&self, image: &image::DynamicImage) -> Result<Tensor> {
        let resized = image.resize_exact(
            INPUT_SIZE as u32,
            INPUT_SIZE as u32,
            image::imageops::FilterType::Lanczos3,
        );
        let rgb = resized.to_rgb8();

        let data: Vec<f32> = rgb
            .pixels()
            .flat_map(|p| {
                [
                    (f32::from(p[0]) / 127.5) - 1.0,
                    (f32::from(p[1]) / 127.5) - 1.0,
                    (f32::from(p[2]) / 127.5) - 1.0,
                ]
            })
            .collect();

        let tensor = Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?;
        tensor
            .permute((0, 3, 1, 2))?
            .to_dtype(DType::F32)
            .context("Failed to preprocess detector input")
    }

    fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        // Stem with asymmetric input padding.
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let x = self.conv0.forward(&x)?.relu()?;

        let mut h = x;
        for block in &self.backbone1 {
            h = block.forward(&h)?;
        }
        let feature_16 = h.clone();
        for block in &self.backbone2 {
            h = block.forward(&h)?;
        }
        let feature_8 = h;

        let c1 = self.classifier_16.forward(&feature_16)?;
        let c1 = c1.permute((0, 2, 3, 1))?.reshape((1, 512, 1))?;
        let r1 = self.regressor_16.forward(&feature_16)?;
        let r1 = r1.permute((0, 2, 3, 1))?.reshape((1, 512, 16))?;

        let c2 = self.classifier_8.forward(&feature_8)?;
        let c2 = c2.permute((0, 2, 3, 1))?.reshape((1, 384, 1))?;
        let r2 = self.regressor_8.forward(&feature_8)?;
        let r2 = r2.permute((0, 2, 3, 1))?.reshape((1, 384, 16))?;

        let scores = Tensor::cat(&[c1, c2], 1)?;
        let boxes = Tensor::cat(&[r1, r2], 1)?;
        Ok((scores, boxes))
    }

    /// Detects the single most confident face, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect_one(&self, image: &image::DynamicImage) -> Result<Option<FaceBox>> {
        let mut detections = self.detect(image)?;
        if detections.is_empty() {
            return Ok(None);
        }
        // NMS output is sorted by score descending.
        Ok(Some(detections.remove(0)))
    }

    /// Detects all faces above the score threshold, NMS-deduplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect(&self, image: &image::DynamicImage) -> Result<Vec<FaceBox>> {
        let input = self.preprocess(image)?;
        let (scores, boxes) = self.forward(&input)?;
        self.decode(&scores, &boxes)
    }

    /// Decodes raw head output into face boxes.
    fn decode(&self, scores: &Tensor, boxes: &Tensor) -> Result<Vec<FaceBox>> {
        let scores = scores.squeeze(0)?.to_vec2::<f32>()?;
        let boxes = boxes.squeeze(0)?.to_vec2::<f32>()?;
        let anchors = self.anchors.to_vec2::<f32>()?;

        let scale = INPUT_SIZE as f32;
        let mut detections = Vec::new();

        for i in 0..NUM_ANCHORS {
            let score = sigmoid(scores[i][0]);
            if score < SCORE_THRESHOLD {
                continue;
            }

            let anchor = &anchors[i];
            let raw = &boxes[i];

            // Center-form offsets relative to the anchor, scaled by the
            // input size.
            let cx = anchor[0] + raw[0] / scale;
            let cy = anchor[1] + raw[1] / scale;
            let w = raw[2] / scale;
            let h = raw[3] / scale;

            let bbox = [
                (cx - w / 2.0).clamp(0.0, 1.0),
                (cy - h / 2.0).clamp(0.0, 1.0),
                (cx + w / 2.0).clamp(0.0, 1.0),
                (cy + h / 2.0).clamp(0.0, 1.0),
            ];

            let mut keypoints = [[0.0f32; 2]; 6];
            for (k, kp) in keypoints.iter_mut().enumerate() {
                let x = anchor[0] + raw[4 + k * 2] / scale;
                let y = anchor[1] + raw[4 + k * 2 + 1] / scale;
                *kp = [x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)];
            }

            detections.push(FaceBox {
                bbox,
                score,
                keypoints,
            });
        }

        Ok(nms(detections))
    }
}

/// Non-maximum suppression, highest score first.
fn nms(mut detections: Vec<FaceBox>) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    while !detections.is_empty() {
        let best = detections.remove(0);
        let bbox = best.bbox;
        keep.push(best);
        detections.retain(|other| iou(&bbox, &other.bbox) < NMS_THRESHOLD);
    }
    keep
}

/// Intersection over union of two corner-form boxes.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_at(bbox: [f32; 4], score: f32) -> FaceBox {
        FaceBox {
            bbox,
            score,
            keypoints: [[0.0; 2]; 6],
        }
    }

    #[test]
    fn test_iou_disjoint() {
        assert!((iou(&[0.0, 0.0, 0.4, 0.4], &[0.6, 0.6, 1.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn test_iou_identical() {
        let b = [0.1, 0.1, 0.9, 0.9];
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = [0.0, 0.0, 0.5, 0.5];
        let b = [0.25, 0.25, 0.75, 0.75];
        let expected = 0.0625 / 0.4375;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_merges_overlaps_keeps_best() {
        let kept = nms(vec![
            face_at([0.1, 0.1, 0.5, 0.5], 0.8),
            face_at([0.12, 0.12, 0.52, 0.52], 0.95),
            face_at([0.7, 0.7, 0.9, 0.9], 0.8),
        ]);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.95).abs() < 1e-6, "best box first");
    }

    #[test]
    fn test_expanded_clamps_to_image() {
        let face = face_at([0.0, 0.0, 0.5, 0.5], 0.9);
        let grown = face.expanded(0.25);
        assert!((grown[0]).abs() < 1e-6);
        assert!((grown[1]).abs() < 1e-6);
        assert!(grown[2] > 0.5 && grown[2] <= 1.0);
        assert!(grown[3] > 0.5 && grown[3] <= 1.0);
    }

    #[test]
    fn test_mouth_is_fourth_keypoint() {
        let mut face = face_at([0.0, 0.0, 1.0, 1.0], 0.9);
        face.keypoints[3] = [0.5, 0.7];
        assert_eq!(face.mouth(), [0.5, 0.7]);
    }
}
