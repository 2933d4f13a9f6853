//! Pipeline orchestration.

use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use tracing::{debug, warn};

use super::{edges, lips, preprocess};
use crate::domain::{adjust_for_skin_tone, SkinTone};
use crate::inference::FaceEngine;

/// Configuration for the scoring pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Canny low gradient threshold.
    pub canny_low: f32,
    /// Canny high gradient threshold.
    pub canny_high: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

/// Scores wrinkle severity for one image at a time.
///
/// The face engine is constructed by the caller and shared here explicitly,
/// which keeps model lifecycle and thread-safety visible instead of hiding
/// them in a process-wide singleton.
pub struct WrinkleAnalyzer {
    config: AnalyzerConfig,
    engine: Arc<FaceEngine>,
}

impl WrinkleAnalyzer {
    /// Creates an analyzer with the given configuration and face engine.
    #[must_use]
    pub const fn new(config: AnalyzerConfig, engine: Arc<FaceEngine>) -> Self {
        Self { config, engine }
    }

    /// Returns the analyzer configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs the full pipeline on one image.
    ///
    /// Normalizes brightness, masks the lip region when a face is found,
    /// derives the edge-density raw score, and applies the skin-tone
    /// adjustment. Landmark failures degrade to an empty mask rather than
    /// failing the request.
    ///
    /// # Errors
    ///
    /// Returns an error if an internal pipeline stage fails.
    pub fn score_image(&self, image: &DynamicImage, tone: SkinTone) -> Result<u8> {
        let enhanced = preprocess::normalize_brightness(image);
        let (width, height) = enhanced.dimensions();

        let mut edge_img = edges::edge_map(&enhanced, self.config.canny_low, self.config.canny_high);

        let enhanced = DynamicImage::ImageRgb8(enhanced);
        let landmarks = match self.engine.landmarks(&enhanced) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("Landmark detection failed, scoring without lip mask: {e:#}");
                None
            }
        };
        if landmarks.is_none() {
            debug!("No face landmarks; lip mask left empty");
        }

        let mask = lips::lip_mask(landmarks.as_ref(), width, height);
        edges::suppress_masked(&mut edge_img, &mask);

        let raw = edges::raw_score(&edge_img);
        debug!(raw_score = raw, skin_tone = tone.value(), "computed raw edge score");

        Ok(adjust_for_skin_tone(raw, tone))
    }
}
