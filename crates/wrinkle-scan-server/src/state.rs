//! Shared application state.

use std::sync::Arc;

use wrinkle_scan_adapters::ArtifactStore;
use wrinkle_scan_core::{RegionExtractor, WrinkleAnalyzer};

use crate::cli::AnalysisMode;

/// State shared across request handlers.
///
/// Everything here is immutable once the server starts; concurrent requests
/// share the loaded models through the `Arc`s without locking.
#[derive(Clone)]
pub struct AppState {
    /// The scoring pipeline.
    pub analyzer: Arc<WrinkleAnalyzer>,
    /// Face cropping and region extraction (regions mode).
    pub extractor: Arc<RegionExtractor>,
    /// Per-request artifact storage.
    pub store: Arc<ArtifactStore>,
    /// Whether uploads are scored whole or per region.
    pub mode: AnalysisMode,
}
