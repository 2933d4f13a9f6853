//! Endpoint integration tests.
//!
//! Drives the router in-process with hand-built multipart bodies; the face
//! engine runs without model files, so detection reports no face and both
//! modes exercise their degraded paths exactly as a fresh install would.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use wrinkle_scan_adapters::ArtifactStore;
use wrinkle_scan_core::{AnalyzerConfig, FaceEngine, RegionExtractor, WrinkleAnalyzer};
use wrinkle_scan_server::cli::AnalysisMode;
use wrinkle_scan_server::routes::router;
use wrinkle_scan_server::state::AppState;
use wrinkle_scan_test_support::{jpeg_bytes, SyntheticImageBuilder};

const BOUNDARY: &str = "wrinkle-scan-test-boundary";

fn test_state(mode: AnalysisMode, data_root: &Path) -> AppState {
    let engine = Arc::new(FaceEngine::disabled());
    let store = ArtifactStore::new(data_root);
    store.ensure_dirs().expect("ensure dirs");

    AppState {
        analyzer: Arc::new(WrinkleAnalyzer::new(
            AnalyzerConfig::default(),
            Arc::clone(&engine),
        )),
        extractor: Arc::new(RegionExtractor::new(engine)),
        store: Arc::new(store),
        mode,
    }
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    data: &'a [u8],
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if let Some(filename) = part.filename {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            );
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = router(state).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn post_analyze(state: AppState, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("request");
    let response = router(state).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

// === Health and base routes ===

#[tokio::test]
async fn test_healthz() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let (status, body) = get_json(state.clone(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "healthy"}));

    // No side effects; a second call answers identically.
    let (status, body) = get_json(state, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_home_reports_live() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let (status, body) = get_json(state, "/").await;
    assert_eq!(status, StatusCode::OK);
    let message = body["message"].as_str().expect("message field");
    assert!(message.ends_with("live!"), "unexpected message: {message}");
}

// === Missing file ===

#[tokio::test]
async fn test_analyze_without_file_field() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let parts = [Part {
        name: "skin_tone",
        filename: None,
        data: b"5",
    }];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "No file uploaded"}));
}

#[tokio::test]
async fn test_analyze_with_empty_multipart() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let (status, body) = post_analyze(state, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_analyze_without_multipart_content_type() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .body(Body::empty())
        .expect("request");
    let response = router(state).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"], "No file uploaded");
}

// === Single mode ===

#[tokio::test]
async fn test_single_mode_rejects_non_image() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let parts = [Part {
        name: "file",
        filename: Some("x.jpg"),
        data: b"this is definitely not a jpeg",
    }];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "Invalid image format"}));
}

#[tokio::test]
async fn test_single_mode_scores_valid_jpeg() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let upload = jpeg_bytes(&SyntheticImageBuilder::face_like(128, 128));
    let parts = [Part {
        name: "file",
        filename: Some("portrait.jpg"),
        data: &upload,
    }];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::OK);
    let score = body["wrinkle_score"].as_i64().expect("integer score");
    assert!((25..=100).contains(&score), "score out of range: {score}");
}

#[tokio::test]
async fn test_single_mode_defaults_skin_tone_to_medium() {
    let temp = tempfile::tempdir().unwrap();
    let upload = jpeg_bytes(&SyntheticImageBuilder::checkerboard(64, 64, 8));

    let parts_default = [Part {
        name: "file",
        filename: Some("a.jpg"),
        data: &upload,
    }];
    let (status, implicit) =
        post_analyze(test_state(AnalysisMode::Single, temp.path()), &parts_default).await;
    assert_eq!(status, StatusCode::OK);

    let parts_explicit = [
        Part {
            name: "file",
            filename: Some("a.jpg"),
            data: &upload,
        },
        Part {
            name: "skin_tone",
            filename: None,
            data: b"5",
        },
    ];
    let (status, explicit) =
        post_analyze(test_state(AnalysisMode::Single, temp.path()), &parts_explicit).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(implicit["wrinkle_score"], explicit["wrinkle_score"]);
}

#[tokio::test]
async fn test_single_mode_rejects_unparsable_skin_tone() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let upload = jpeg_bytes(&SyntheticImageBuilder::face_like(64, 64));
    let parts = [
        Part {
            name: "file",
            filename: Some("a.jpg"),
            data: &upload,
        },
        Part {
            name: "skin_tone",
            filename: None,
            data: b"medium",
        },
    ];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid skin_tone value");
}

#[tokio::test]
async fn test_single_mode_clamps_out_of_range_skin_tone() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let upload = jpeg_bytes(&SyntheticImageBuilder::face_like(64, 64));
    let parts = [
        Part {
            name: "file",
            filename: Some("a.jpg"),
            data: &upload,
        },
        Part {
            name: "skin_tone",
            filename: None,
            data: b"99",
        },
    ];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::OK);
    let score = body["wrinkle_score"].as_i64().expect("integer score");
    assert!((25..=100).contains(&score));
}

#[tokio::test]
async fn test_single_mode_persists_upload_artifact() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Single, temp.path());

    let upload = jpeg_bytes(&SyntheticImageBuilder::face_like(64, 64));
    let parts = [Part {
        name: "file",
        filename: Some("audit-me.jpg"),
        data: &upload,
    }];
    let (status, _) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::OK);
    assert!(temp.path().join("uploads/audit-me.jpg").exists());
}

// === Regions mode ===

#[tokio::test]
async fn test_regions_mode_reports_no_regions_without_face() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Regions, temp.path());

    // With no models installed the detector reports no face, so even a
    // plausible portrait yields no regions.
    let upload = jpeg_bytes(&SyntheticImageBuilder::face_like(128, 128));
    let parts = [Part {
        name: "file",
        filename: Some("portrait.jpg"),
        data: &upload,
    }];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "No facial regions detected"}));
}

#[tokio::test]
async fn test_regions_mode_undecodable_upload_reports_no_regions() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Regions, temp.path());

    let parts = [Part {
        name: "file",
        filename: Some("x.jpg"),
        data: b"garbage bytes",
    }];
    let (status, body) = post_analyze(state, &parts).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No facial regions detected");
}

#[tokio::test]
async fn test_regions_mode_missing_file_still_reports_no_file() {
    let temp = tempfile::tempdir().unwrap();
    let state = test_state(AnalysisMode::Regions, temp.path());

    let (status, body) = post_analyze(state, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}
