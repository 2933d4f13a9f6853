//! HTTP routes and handlers.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use wrinkle_scan_core::{normalize_score, AnalyzeError, SkinTone};

use crate::cli::AnalysisMode;
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route("/analyze", post(analyze))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Base route.
async fn home() -> impl IntoResponse {
    Json(json!({ "message": "Wrinkle detection API is live!" }))
}

/// Health check.
async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Analyzes wrinkles from an uploaded image.
///
/// Multipart form: `file` (required image), `skin_tone` (optional integer
/// 1-10, default 5).
async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Ok(mut multipart) = multipart else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut skin_tone_text: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!("Malformed multipart body: {e}");
                break;
            }
        };

        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.jpg").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => debug!("Failed to read file field: {e}"),
                }
            }
            Some("skin_tone") => match field.text().await {
                Ok(text) => skin_tone_text = Some(text),
                Err(e) => debug!("Failed to read skin_tone field: {e}"),
            },
            _ => {}
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    let tone = match skin_tone_text {
        None => SkinTone::default(),
        Some(text) => match text.trim().parse::<i64>() {
            Ok(value) => SkinTone::new(value),
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid skin_tone value");
            }
        },
    };

    // Audit copy of the raw upload; a failed write is not fatal.
    if let Err(e) = state.store.save_upload(&filename, &bytes) {
        warn!("Failed to persist upload {filename}: {e:#}");
    }

    // The pipeline is CPU-bound and blocking; keep it off the async workers.
    let result =
        tokio::task::spawn_blocking(move || run_pipeline(&state, &filename, &bytes, tone)).await;

    match result {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(AnalyzeError::InvalidImage)) => {
            error_response(StatusCode::BAD_REQUEST, "Invalid image format")
        }
        Ok(Err(AnalyzeError::NoRegionsDetected)) => {
            error_response(StatusCode::BAD_REQUEST, "No facial regions detected")
        }
        Ok(Err(AnalyzeError::Internal(e))) => {
            warn!("Analysis failed: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e) => {
            warn!("Analysis task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Runs the scoring pipeline for one upload.
fn run_pipeline(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
    tone: SkinTone,
) -> Result<serde_json::Value, AnalyzeError> {
    match state.mode {
        AnalysisMode::Single => {
            let image = image::load_from_memory(bytes).map_err(|e| {
                debug!("Image decode failed: {e}");
                AnalyzeError::InvalidImage
            })?;

            let score = state.analyzer.score_image(&image, tone)?;
            // Defensive second clamp at the reporting boundary.
            let score = normalize_score(f64::from(score));
            Ok(json!({ "wrinkle_score": score }))
        }
        AnalysisMode::Regions => {
            // An undecodable upload yields no crop and therefore no regions,
            // matching the region loop finding nothing.
            let Ok(image) = image::load_from_memory(bytes) else {
                debug!("Image decode failed in regions mode");
                return Err(AnalyzeError::NoRegionsDetected);
            };

            let Some(face) = state.extractor.crop_face(&image)? else {
                return Err(AnalyzeError::NoRegionsDetected);
            };
            if let Err(e) = state.store.save_processed(filename, &face) {
                warn!("Failed to persist face crop for {filename}: {e:#}");
            }

            let face = image::DynamicImage::ImageRgb8(face);
            let regions = state.extractor.extract(&face)?;
            if regions.is_empty() {
                return Err(AnalyzeError::NoRegionsDetected);
            }

            let mut scores = serde_json::Map::new();
            for (region, crop) in regions.iter() {
                if let Err(e) = state.store.save_region(filename, region, crop) {
                    warn!("Failed to persist {region} crop for {filename}: {e:#}");
                }

                let crop = image::DynamicImage::ImageRgb8(crop.clone());
                let score = state.analyzer.score_image(&crop, tone)?;
                scores.insert(
                    region.as_str().to_string(),
                    json!(normalize_score(f64::from(score))),
                );
            }
            Ok(json!({ "wrinkle_scores": scores }))
        }
    }
}

/// Builds a JSON error response.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
