//! The face engine: explicitly owned model state.
//!
//! Both models load lazily on first use and are cached for the engine's
//! lifetime. An engine without configured model paths reports no faces,
//! which the pipeline treats the same as "no face in the photo".

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing::debug;

use super::{get_device, load_safetensors, FaceBox, FaceDetector, FaceLandmarks, LandmarkNet};

/// Configuration for the face engine.
#[derive(Debug, Clone)]
pub struct FaceEngineConfig {
    /// Path to the face detector checkpoint.
    pub detector_model_path: Option<PathBuf>,
    /// Path to the landmark regressor checkpoint.
    pub landmarks_model_path: Option<PathBuf>,
    /// Minimum detection confidence for a face to be used.
    pub min_face_confidence: f32,
}

impl Default for FaceEngineConfig {
    fn default() -> Self {
        Self {
            detector_model_path: None,
            landmarks_model_path: None,
            min_face_confidence: 0.75,
        }
    }
}

impl FaceEngineConfig {
    /// Sets the detector checkpoint path.
    #[must_use]
    pub fn with_detector_path(mut self, path: impl AsRef<Path>) -> Self {
        self.detector_model_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the landmark checkpoint path.
    #[must_use]
    pub fn with_landmarks_path(mut self, path: impl AsRef<Path>) -> Self {
        self.landmarks_model_path = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Lazily loaded model pair.
struct EngineModels {
    detector: FaceDetector,
    landmarks: LandmarkNet,
}

/// Owns the detector and landmark models used by the pipeline.
pub struct FaceEngine {
    config: FaceEngineConfig,
    models: OnceLock<Result<EngineModels, String>>,
}

impl FaceEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub const fn new(config: FaceEngineConfig) -> Self {
        Self {
            config,
            models: OnceLock::new(),
        }
    }

    /// Creates an engine with no models configured.
    ///
    /// Every detection reports "no face"; the scoring pipeline still runs
    /// with an empty lip mask.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(FaceEngineConfig::default())
    }

    /// Returns true when both model paths are configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.detector_model_path.is_some() && self.config.landmarks_model_path.is_some()
    }

    /// Loads or returns the cached models.
    fn get_models(&self) -> Result<&EngineModels> {
        let result = self
            .models
            .get_or_init(|| self.load_models().map_err(|e| format!("{e:#}")));
        result.as_ref().map_err(|e| anyhow::anyhow!("{e}"))
    }

    fn load_models(&self) -> Result<EngineModels> {
        let device = get_device();

        let detector_path = self
            .config
            .detector_model_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Face detector model path not configured"))?;
        debug!("Loading face detector from {}", detector_path.display());
        let vb = load_safetensors(detector_path, &device)
            .context("Failed to load face detector weights")?;
        let detector = FaceDetector::new(vb).context("Failed to create face detector")?;

        let landmarks_path = self
            .config
            .landmarks_model_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Landmark model path not configured"))?;
        debug!("Loading landmark regressor from {}", landmarks_path.display());
        let vb = load_safetensors(landmarks_path, &device)
            .context("Failed to load landmark weights")?;
        let landmarks = LandmarkNet::new(vb).context("Failed to create landmark regressor")?;

        Ok(EngineModels {
            detector,
            landmarks,
        })
    }

    /// Detects the single most confident face above the confidence floor.
    ///
    /// Returns `Ok(None)` when no models are configured or no face clears
    /// the threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or inference fails.
    pub fn detect_face(&self, image: &image::DynamicImage) -> Result<Option<FaceBox>> {
        if !self.is_configured() {
            debug!("Face engine not configured; reporting no face");
            return Ok(None);
        }

        let models = self.get_models()?;
        let Some(face) = models.detector.detect_one(image)? else {
            return Ok(None);
        };

        if face.score < self.config.min_face_confidence {
            debug!("Discarding low-confidence face: {:.2}", face.score);
            return Ok(None);
        }
        Ok(Some(face))
    }

    /// Detects a face and regresses its 68 landmarks.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or inference fails.
    pub fn landmarks(&self, image: &image::DynamicImage) -> Result<Option<FaceLandmarks>> {
        let Some(face) = self.detect_face(image)? else {
            return Ok(None);
        };
        let models = self.get_models()?;
        Ok(Some(models.landmarks.detect(image, &face.bbox)?))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FaceEngineConfig::default();
        assert!(config.detector_model_path.is_none());
        assert!(config.landmarks_model_path.is_none());
        assert!((config.min_face_confidence - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_builder() {
        let config = FaceEngineConfig::default()
            .with_detector_path("/models/blazeface.safetensors")
            .with_landmarks_path("/models/landmarks68.safetensors");
        assert!(config.detector_model_path.is_some());
        assert!(config.landmarks_model_path.is_some());
    }

    #[test]
    fn test_disabled_engine_reports_no_face() {
        let engine = FaceEngine::disabled();
        assert!(!engine.is_configured());

        let image = image::DynamicImage::new_rgb8(64, 64);
        let face = engine.detect_face(&image).expect("detect");
        assert!(face.is_none());
        let landmarks = engine.landmarks(&image).expect("landmarks");
        assert!(landmarks.is_none());
    }

    #[test]
    fn test_missing_model_files_error_once_configured() {
        let config = FaceEngineConfig::default()
            .with_detector_path("/nonexistent/detector.safetensors")
            .with_landmarks_path("/nonexistent/landmarks.safetensors");
        let engine = FaceEngine::new(config);
        assert!(engine.is_configured());

        let image = image::DynamicImage::new_rgb8(64, 64);
        assert!(engine.detect_face(&image).is_err());
        // The load failure is cached; a second call errors the same way.
        assert!(engine.detect_face(&image).is_err());
    }
}
