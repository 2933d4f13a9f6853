//! Wrinkle Scan server binary.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wrinkle_scan_adapters::{ensure_models, model_path, models_dir, set_models_dir, ArtifactStore};
use wrinkle_scan_core::{
    AnalyzerConfig, FaceEngine, FaceEngineConfig, RegionExtractor, WrinkleAnalyzer,
};
use wrinkle_scan_server::cli::Cli;
use wrinkle_scan_server::config::AppConfig;
use wrinkle_scan_server::routes;
use wrinkle_scan_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();
    let settings = config.resolve(&cli);

    if let Some(dir) = settings.models_dir.clone() {
        debug!("Using custom models directory: {}", dir.display());
        set_models_dir(Some(dir));
    }

    if cli.fetch_models {
        // reqwest's blocking client must stay off the async runtime.
        tokio::task::spawn_blocking(ensure_models)
            .await
            .context("Model fetch task failed")?
            .context("Failed to fetch model files")?;
    }

    let store = ArtifactStore::new(&settings.data_dir);
    store
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let engine = Arc::new(build_engine(settings.min_face_confidence));
    let analyzer = WrinkleAnalyzer::new(
        AnalyzerConfig {
            canny_low: settings.canny_low,
            canny_high: settings.canny_high,
        },
        Arc::clone(&engine),
    );
    let extractor = RegionExtractor::new(engine);

    let state = AppState {
        analyzer: Arc::new(analyzer),
        extractor: Arc::new(extractor),
        store: Arc::new(store),
        mode: settings.mode,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("Failed to bind port {}", settings.port))?;

    info!(
        "Wrinkle detection API is live on port {} ({} mode)",
        settings.port,
        settings.mode.as_str()
    );
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Builds the face engine from installed model files.
///
/// Missing models leave the engine disabled: single mode scores without a
/// lip mask and regions mode reports no detected regions.
fn build_engine(min_face_confidence: f32) -> FaceEngine {
    let (Some(detector), Some(landmarks)) = (model_path("blazeface"), model_path("landmarks68"))
    else {
        info!("Face engine disabled: unknown model configuration.");
        return FaceEngine::disabled();
    };

    if !detector.exists() || !landmarks.exists() {
        info!(
            "Face models not installed under {}; run with --fetch-models to download. \
             Lip masking and region extraction are disabled.",
            models_dir().display()
        );
        return FaceEngine::disabled();
    }

    FaceEngine::new(FaceEngineConfig {
        detector_model_path: Some(detector),
        landmarks_model_path: Some(landmarks),
        min_face_confidence,
    })
}
