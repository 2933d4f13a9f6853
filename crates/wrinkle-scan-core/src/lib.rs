//! Wrinkle Scan Core - scoring pipeline and domain logic
//!
//! This crate contains the domain types, the edge-density scoring pipeline
//! (brightness normalization, lip masking, Canny scoring, skin-tone
//! adjustment), and the face detection / landmark inference it relies on.

pub mod analysis;
pub mod domain;
pub mod inference;
pub mod regions;

pub use analysis::{AnalyzerConfig, WrinkleAnalyzer};
pub use domain::{adjust_for_skin_tone, normalize_score, AnalyzeError, FaceRegion, SkinTone};
pub use inference::{FaceEngine, FaceEngineConfig};
pub use regions::{RegionExtractor, RegionSet};
