//! API integration tests over a tempdir-backed state with fake engines.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use vlore_api::{create_router, ApiConfig, AppState, Engines};
use vlore_models::{VideoMeta, WhisperMode};
use vlore_ports::testing::{FakeNounPhrases, FakeTranscriber, FakeVideoSource, StubEmbedder};
use vlore_ports::{PortResult, Transcriber, Transcription};

const CALM_TEXT: &str = "Morning meditation changed my whole routine. \
    Deep breathing exercises calm the nervous system. \
    Guided meditation works best before sleep. \
    A quiet mind makes room for better focus.";

/// Keeps a job in flight long enough for control calls to land.
struct SlowTranscriber(FakeTranscriber);

#[async_trait::async_trait]
impl Transcriber for SlowTranscriber {
    async fn transcribe(
        &self,
        audio_path: &std::path::Path,
        tier: WhisperMode,
    ) -> PortResult<Transcription> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.0.transcribe(audio_path, tier).await
    }
}

async fn app_with_engines(tmp: &TempDir, engines: Engines) -> Router {
    let config = ApiConfig {
        accounts_dir: tmp.path().join("accounts"),
        data_dir: tmp.path().join("data"),
        config_dir: tmp.path().join("config"),
        work_dir: tmp.path().join("work"),
        ..ApiConfig::default()
    };
    let state = AppState::new(config, engines).await.unwrap();
    create_router(state, None)
}

async fn app(tmp: &TempDir, source: FakeVideoSource, transcriber: FakeTranscriber) -> Router {
    app_with_engines(
        tmp,
        Engines {
            source: Arc::new(source),
            transcriber: Arc::new(transcriber),
            embedder: Arc::new(StubEmbedder::default()),
            nlp: Arc::new(FakeNounPhrases::new()),
        },
    )
    .await
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..500 {
        let (status, body) = send(app, "GET", &format!("/api/ingest/status/{job_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let state = body["status"].as_str().unwrap_or_default().to_string();
        if matches!(state.as_str(), "complete" | "failed" | "cancelled") {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal status");
}

#[tokio::test]
async fn test_health_endpoint() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_verify_system_warning_when_empty() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    let (status, body) = send(&app, "GET", "/api/verify/system", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "warning");
    assert_eq!(body["total_creators"], 0);
    assert_eq!(body["total_vectors"], 0);
}

#[tokio::test]
async fn test_empty_creator_job_leaves_no_trace() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ingest/start",
        Some(json!({ "usernames": ["none"], "filters": {}, "settings": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &job_id).await;
    assert_eq!(job["status"], "complete");

    let (status, body) = send(&app, "GET", "/api/accounts/none/tags", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("tags not found"));

    let (_, verify) = send(&app, "GET", "/api/verify/system", None).await;
    assert_eq!(verify["total_creators"], 0);
}

#[tokio::test]
async fn test_ingest_then_search_and_highlight() {
    let tmp = TempDir::new().unwrap();
    let source = FakeVideoSource::new().with_videos(
        "calmcorner",
        vec![
            VideoMeta::new("v1", "meditation basics", "https://videos.example/calmcorner/v1")
                .with_duration(40.0),
            VideoMeta::new("v2", "breathing guide", "https://videos.example/calmcorner/v2")
                .with_duration(40.0),
        ],
    );
    let transcriber = FakeTranscriber::new().with_default_text(CALM_TEXT);
    let app = app(&tmp, source, transcriber).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ingest/start",
        Some(json!({
            "usernames": ["calmcorner"],
            "filters": { "last_n_videos": 2 },
            "settings": { "whisper_mode": "fast" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = wait_for_job(&app, &job_id).await;
    assert_eq!(job["status"], "complete");
    assert_eq!(job["accounts"][0]["processed"], 2);

    // Account surface
    let (status, accounts) = send(&app, "GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accounts[0]["creator"], "calmcorner");
    assert_eq!(accounts[0]["has_transcripts"], true);

    let (status, category) = send(&app, "GET", "/api/accounts/calmcorner/category", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(category["confidence"].as_f64().is_some());

    let (status, umbrellas) = send(&app, "GET", "/api/accounts/calmcorner/umbrellas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(umbrellas.as_array().unwrap().len() <= 5);

    // Semantic search: non-increasing scores, only the ingested creator
    let (status, results) = send(
        &app,
        "POST",
        "/api/search/semantic",
        Some(json!({
            "query": "meditation",
            "top_k": 10,
            "filters": { "min_score": 0.15 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap().clone();
    assert!(!results.is_empty());
    let scores: Vec<f64> = results
        .iter()
        .map(|r| r["score"].as_f64().unwrap())
        .collect();
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    for result in &results {
        assert_eq!(result["creator"], "calmcorner");
        assert!(result["score"].as_f64().unwrap() >= 0.15);
    }

    // Transcript highlight: consistent across identical calls
    let (status, first) = send(
        &app,
        "GET",
        "/api/transcript/calmcorner/v1?query=meditation",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        first["segments"].as_array().unwrap().len(),
        first["total_segments"].as_u64().unwrap() as usize
    );
    let (_, second) = send(
        &app,
        "GET",
        "/api/transcript/calmcorner/v1?query=meditation",
        None,
    )
    .await;
    assert_eq!(first["highlighted_count"], second["highlighted_count"]);

    // Timestamp highlights
    let (status, stamped) = send(
        &app,
        "GET",
        "/api/transcript/calmcorner/v1?highlights=00:03",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stamped["highlighted_count"].as_u64().unwrap() > 0);

    // System is healthy once creators and vectors exist
    let (_, verify) = send(&app, "GET", "/api/verify/system", None).await;
    assert_eq!(verify["status"], "healthy");
    assert_eq!(verify["total_creators"], 1);
    assert!(verify["total_vectors"].as_u64().unwrap() > 0);

    // Filter options include the new creator
    let (status, options) = send(&app, "GET", "/api/search/filter-options", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(options["creators"][0], "calmcorner");
}

#[tokio::test]
async fn test_job_control_protocol_errors() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    // Unknown job
    let (status, _) = send(
        &app,
        "GET",
        "/api/ingest/status/00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Pause after completion is a conflict
    let (_, body) = send(
        &app,
        "POST",
        "/api/ingest/start",
        Some(json!({ "usernames": ["none"] })),
    )
    .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    wait_for_job(&app, &job_id).await;

    let (status, _) = send(&app, "POST", &format!("/api/ingest/pause/{job_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, "POST", &format!("/api/ingest/resume/{job_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_then_pause_conflicts() {
    let tmp = TempDir::new().unwrap();
    let source = FakeVideoSource::new().with_videos(
        "maker",
        vec![VideoMeta::new("v1", "t", "https://videos.example/maker/v1")],
    );
    let transcriber = SlowTranscriber(FakeTranscriber::new().with_default_text(CALM_TEXT));
    let app = app_with_engines(
        &tmp,
        Engines {
            source: Arc::new(source),
            transcriber: Arc::new(transcriber),
            embedder: Arc::new(StubEmbedder::default()),
            nlp: Arc::new(FakeNounPhrases::new()),
        },
    )
    .await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/ingest/start",
        Some(json!({ "usernames": ["maker"] })),
    )
    .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", &format!("/api/ingest/cancel/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let job = wait_for_job(&app, &job_id).await;
    assert_eq!(job["status"], "cancelled");

    let (status, _) = send(&app, "POST", &format!("/api/ingest/pause/{job_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_validation_errors_are_bad_requests() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/ingest/start",
        Some(json!({ "usernames": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/search/semantic",
        Some(json!({ "query": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transcript_missing_video_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, FakeVideoSource::new(), FakeTranscriber::new()).await;

    let (status, _) = send(&app, "GET", "/api/transcript/ghost/v404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metadata_preview_has_no_side_effects() {
    let tmp = TempDir::new().unwrap();
    let source = FakeVideoSource::new().with_videos(
        "maker",
        vec![VideoMeta::new("v1", "a title", "https://videos.example/maker/v1")],
    );
    let app = app(&tmp, source, FakeTranscriber::new()).await;

    let (status, body) = send(&app, "GET", "/api/ingest/metadata/maker", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "a title");

    let (_, verify) = send(&app, "GET", "/api/verify/system", None).await;
    assert_eq!(verify["total_creators"], 0);
}
