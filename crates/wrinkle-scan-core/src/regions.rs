//! Face cropping and anatomical region extraction.
//!
//! Regions mode splits a cropped face into four named areas (forehead, both
//! cheeks, chin) and scores each independently. The hand-off to scoring is
//! an in-memory map; callers may additionally persist the crops for audit.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::domain::FaceRegion;
use crate::inference::{FaceEngine, FaceLandmarks, LANDMARK_COUNT};

/// Margin added around the detected face box before cropping, as a fraction
/// of the box size.
const FACE_CROP_MARGIN: f32 = 0.2;

/// Rectangles narrower or shorter than this are dropped as undetected.
const MIN_REGION_EDGE: u32 = 2;

/// A pixel-space rectangle inside a face crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Extracted region images, keyed by region name in reporting order.
#[derive(Debug, Default)]
pub struct RegionSet {
    regions: BTreeMap<FaceRegion, RgbImage>,
}

impl RegionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a region image.
    pub fn insert(&mut self, region: FaceRegion, image: RgbImage) {
        self.regions.insert(region, image);
    }

    /// Returns the image for a region, if extracted.
    #[must_use]
    pub fn get(&self, region: FaceRegion) -> Option<&RgbImage> {
        self.regions.get(&region)
    }

    /// Iterates regions in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (FaceRegion, &RgbImage)> {
        self.regions.iter().map(|(region, image)| (*region, image))
    }

    /// Number of extracted regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true when nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Crops faces and splits them into named regions.
pub struct RegionExtractor {
    engine: Arc<FaceEngine>,
}

impl RegionExtractor {
    /// Creates an extractor sharing the given face engine.
    #[must_use]
    pub const fn new(engine: Arc<FaceEngine>) -> Self {
        Self { engine }
    }

    /// Detects and crops the face from an image.
    ///
    /// Returns `None` when no face clears the confidence floor.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn crop_face(&self, image: &DynamicImage) -> Result<Option<RgbImage>> {
        let Some(face) = self.engine.detect_face(image)? else {
            return Ok(None);
        };

        let [x0, y0, x1, y1] = face.expanded(FACE_CROP_MARGIN);
        let img_w = image.width() as f32;
        let img_h = image.height() as f32;

        let px = (x0 * img_w) as u32;
        let py = (y0 * img_h) as u32;
        let pw = ((x1 - x0) * img_w) as u32;
        let ph = ((y1 - y0) * img_h) as u32;

        if pw < MIN_REGION_EDGE || ph < MIN_REGION_EDGE {
            debug!("Face box degenerate after projection; treating as no face");
            return Ok(None);
        }

        Ok(Some(image.crop_imm(px, py, pw, ph).to_rgb8()))
    }

    /// Extracts the four named regions from a face crop.
    ///
    /// Regions whose rectangles collapse are omitted (best effort); with no
    /// usable landmarks the set comes back empty.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn extract(&self, face: &DynamicImage) -> Result<RegionSet> {
        let mut set = RegionSet::new();

        let Some(landmarks) = self.engine.landmarks(face)? else {
            return Ok(set);
        };

        for (region, rect) in region_rects(&landmarks, face.width(), face.height()) {
            let crop = face.crop_imm(rect.x, rect.y, rect.width, rect.height).to_rgb8();
            set.insert(region, crop);
        }
        debug!("Extracted {} facial regions", set.len());
        Ok(set)
    }

    /// Crops the face and extracts regions in one pass.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn crop_and_extract(&self, image: &DynamicImage) -> Result<RegionSet> {
        let Some(face) = self.crop_face(image)? else {
            return Ok(RegionSet::new());
        };
        self.extract(&DynamicImage::ImageRgb8(face))
    }
}

/// Derives region rectangles from the 68-point landmark layout.
///
/// Forehead sits between the crop top and the brow line, cheeks between the
/// eye line and the mouth on either side of the nose base, chin between the
/// lower lip and the jaw bottom.
#[must_use]
pub fn region_rects(
    landmarks: &FaceLandmarks,
    width: u32,
    height: u32,
) -> Vec<(FaceRegion, RegionRect)> {
    if landmarks.len() < LANDMARK_COUNT {
        return Vec::new();
    }

    let x = |i: usize| landmarks.point(i).map(|p| p.0);
    let brow_top = fold_coord(landmarks, 17..=26, |p| p.1, f32::min);
    let brow_left = fold_coord(landmarks, 17..=26, |p| p.0, f32::min);
    let brow_right = fold_coord(landmarks, 17..=26, |p| p.0, f32::max);
    let eye_bottom = fold_coord(landmarks, 36..=47, |p| p.1, f32::max);
    let mouth_top = fold_coord(landmarks, 48..=59, |p| p.1, f32::min);
    let lip_bottom = fold_coord(landmarks, 48..=59, |p| p.1, f32::max);
    let jaw_left = fold_coord(landmarks, 0..=16, |p| p.0, f32::min);
    let jaw_right = fold_coord(landmarks, 0..=16, |p| p.0, f32::max);
    let jaw_bottom = fold_coord(landmarks, 0..=16, |p| p.1, f32::max);
    let (Some(nose_left), Some(nose_right)) = (x(31), x(35)) else {
        return Vec::new();
    };
    let (Some(chin_left), Some(chin_right)) = (x(5), x(11)) else {
        return Vec::new();
    };

    let candidates = [
        (FaceRegion::Forehead, (brow_left, 0.0, brow_right, brow_top)),
        (
            FaceRegion::LeftCheek,
            (jaw_left, eye_bottom, nose_left, mouth_top),
        ),
        (
            FaceRegion::RightCheek,
            (nose_right, eye_bottom, jaw_right, mouth_top),
        ),
        (
            FaceRegion::Chin,
            (chin_left, lip_bottom, chin_right, jaw_bottom),
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(region, (x0, y0, x1, y1))| {
            project_rect(x0, y0, x1, y1, width, height).map(|rect| (region, rect))
        })
        .collect()
}

/// Folds a coordinate over a landmark index range.
fn fold_coord(
    landmarks: &FaceLandmarks,
    indices: std::ops::RangeInclusive<usize>,
    coord: fn((f32, f32)) -> f32,
    combine: fn(f32, f32) -> f32,
) -> f32 {
    indices
        .filter_map(|i| landmarks.point(i))
        .map(coord)
        .fold(f32::NAN, |acc, v| if acc.is_nan() { v } else { combine(acc, v) })
}

/// Projects a normalized rectangle into pixels, dropping degenerate ones.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn project_rect(x0: f32, y0: f32, x1: f32, y1: f32, width: u32, height: u32) -> Option<RegionRect> {
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return None;
    }

    let px0 = (x0.clamp(0.0, 1.0) * width as f32) as u32;
    let py0 = (y0.clamp(0.0, 1.0) * height as f32) as u32;
    let px1 = ((x1.clamp(0.0, 1.0) * width as f32) as u32).min(width);
    let py1 = ((y1.clamp(0.0, 1.0) * height as f32) as u32).min(height);

    let w = px1.saturating_sub(px0);
    let h = py1.saturating_sub(py0);
    if w < MIN_REGION_EDGE || h < MIN_REGION_EDGE {
        return None;
    }

    Some(RegionRect {
        x: px0,
        y: py0,
        width: w,
        height: h,
    })
}
