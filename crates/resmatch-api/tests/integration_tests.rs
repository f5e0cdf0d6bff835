//! Integration tests for the resmatch API.
//!
//! Covers every endpoint's happy path and its error paths. Each test builds
//! its own in-memory catalog unless it is checking persistence.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use resmatch_api::create_router;
use resmatch_api::error::ErrorBody;
use resmatch_api::handlers::{
    EmbedResponse, HealthResponse, MatchResponse, TextMatchResponse, UploadResponse,
};
use resmatch_api::state::AppState;
use resmatch_core::config::MatchConfig;
use resmatch_vector::{Catalog, CatalogPaths};

// =============================================================================
// Helpers
// =============================================================================

const DIM: usize = 64;

fn test_config() -> MatchConfig {
    let mut config = MatchConfig::default();
    config.index.dimension = DIM;
    config
}

fn make_state() -> AppState {
    let catalog = Arc::new(Catalog::in_memory(DIM).unwrap());
    AppState::build(test_config(), catalog).unwrap()
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_bytes(resp).await)
}

fn resumes() -> Value {
    json!({
        "documents": [
            {"file_name": "rust_backend.pdf", "text": "Rust backend engineer. Tokio, axum, PostgreSQL, Kubernetes deployments."},
            {"file_name": "pastry.docx", "text": "Pastry chef. Laminated doughs, chocolate tempering, wedding cakes."},
            {"file_name": "data_science.pdf", "text": "Data scientist. Python, pandas, scikit-learn, PostgreSQL, dashboards."}
        ]
    })
}

async fn upload(app: &axum::Router, body: &Value) -> UploadResponse {
    let (status, bytes) = send(app, post_json("/upload-resumes", body)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// GET /health
// =============================================================================

#[tokio::test]
async fn test_health_empty_catalog() {
    let app = make_app();
    let (status, bytes) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.indexed_documents, 0);
    assert_eq!(health.dimension, DIM);
    assert!(!health.desynced);
}

#[tokio::test]
async fn test_health_counts_uploads() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let (_, bytes) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.indexed_documents, 3);
}

// =============================================================================
// POST /embed
// =============================================================================

#[tokio::test]
async fn test_embed_happy_path() {
    let app = make_app();
    let (status, bytes) = send(
        &app,
        post_json("/embed", &json!({"text": "Senior Rust engineer"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let resp: EmbedResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.dimension, DIM);
    assert_eq!(resp.embedding.len(), DIM);
    let norm: f32 = resp.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_embed_blank_text_returns_400() {
    let app = make_app();
    let (status, bytes) = send(&app, post_json("/embed", &json!({"text": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err.error, "bad_request");
}

#[tokio::test]
async fn test_embed_malformed_json_returns_400() {
    let app = make_app();
    let req = Request::post("/embed")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, bytes) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err.error, "bad_request");
}

#[tokio::test]
async fn test_embed_missing_field_returns_422() {
    let app = make_app();
    let (status, bytes) = send(&app, post_json("/embed", &json!({"txt": "typo"}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err.error, "unprocessable_entity");
}

// =============================================================================
// POST /upload-resumes
// =============================================================================

#[tokio::test]
async fn test_upload_indexes_documents() {
    let app = make_app();
    let resp = upload(&app, &resumes()).await;

    assert_eq!(resp.indexed, 3);
    assert_eq!(resp.total, 3);
    assert!(resp.skipped.is_empty());
    assert_eq!(resp.message, "3 resumes uploaded and indexed successfully.");
}

#[tokio::test]
async fn test_upload_skips_blank_documents() {
    let app = make_app();
    let resp = upload(
        &app,
        &json!({"documents": [
            {"file_name": "scan.pdf", "text": "   "},
            {"file_name": "ok.pdf", "text": "Go developer, gRPC, Kafka"}
        ]}),
    )
    .await;

    assert_eq!(resp.indexed, 1);
    assert_eq!(resp.skipped.len(), 1);
    assert_eq!(resp.skipped[0].file_name, "scan.pdf");
    assert_eq!(resp.total, 1);
}

#[tokio::test]
async fn test_upload_nothing_valid() {
    let app = make_app();
    let resp = upload(
        &app,
        &json!({"documents": [{"file_name": "empty.pdf", "text": ""}]}),
    )
    .await;

    assert_eq!(resp.message, "No valid resumes found.");
    assert_eq!(resp.indexed, 0);
    assert_eq!(resp.total, 0);

    let resp = upload(&app, &json!({"documents": []})).await;
    assert_eq!(resp.message, "No valid resumes found.");
}

// =============================================================================
// POST /match-text
// =============================================================================

#[tokio::test]
async fn test_match_text_empty_catalog_returns_404() {
    let app = make_app();
    let (status, bytes) = send(
        &app,
        post_json("/match-text", &json!({"text": "Rust engineer"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err.error, "not_found");
}

#[tokio::test]
async fn test_match_text_ranks_and_explains() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let (status, bytes) = send(
        &app,
        post_json(
            "/match-text",
            &json!({"text": "Hiring a Rust backend engineer: Tokio, axum, Kubernetes", "top_k": 2}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let resp: TextMatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.top_k, 2);
    assert_eq!(resp.results.len(), 2);

    let best = &resp.results[0];
    assert_eq!(best.rank, 1);
    assert_eq!(best.file_name, "rust_backend.pdf");
    assert_eq!(best.predicted_role, "Uploaded");
    assert!(best.similarity_score >= resp.results[1].similarity_score);
    assert!(best.resume_snippet.starts_with("Rust backend engineer"));
    let explanation = best.llm_explanation.as_deref().unwrap();
    assert!(explanation.contains("Key overlapping skills"));
    assert!(explanation.contains("tokio"));
}

#[tokio::test]
async fn test_match_text_default_top_k() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let (_, bytes) = send(
        &app,
        post_json("/match-text", &json!({"text": "PostgreSQL"})),
    )
    .await;
    let resp: TextMatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.top_k, 5);
    assert_eq!(resp.results.len(), 3);
    let ranks: Vec<usize> = resp.results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_match_text_blank_returns_400() {
    let app = make_app();
    let (status, _) = send(&app, post_json("/match-text", &json!({"text": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// POST /match
// =============================================================================

#[tokio::test]
async fn test_match_with_stored_embedding() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let text = resumes()["documents"][2]["text"].as_str().unwrap().to_string();
    let (_, bytes) = send(&app, post_json("/embed", &json!({"text": text}))).await;
    let embedded: EmbedResponse = serde_json::from_slice(&bytes).unwrap();

    let (status, bytes) = send(
        &app,
        post_json(
            "/match",
            &json!({"job_embedding": embedded.embedding, "top_k": 1}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let resp: MatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.top_k, 1);
    assert_eq!(resp.results.len(), 1);
    assert_eq!(resp.results[0].rank, 1);
    assert_eq!(resp.results[0].resume_index, 2);
    assert!((resp.results[0].similarity_score - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_match_clamps_top_k() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let mut embedding = vec![0.0f32; DIM];
    embedding[0] = 1.0;
    let (_, bytes) = send(
        &app,
        post_json("/match", &json!({"job_embedding": embedding, "top_k": 0})),
    )
    .await;
    let resp: MatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.top_k, 1);
    assert_eq!(resp.results.len(), 1);
}

#[tokio::test]
async fn test_match_wrong_dimension_returns_422() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let (status, bytes) = send(
        &app,
        post_json("/match", &json!({"job_embedding": [0.1, 0.2, 0.3]})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert!(err.message.to_lowercase().contains("dimension"));
}

#[tokio::test]
async fn test_match_zero_vector_returns_422() {
    let app = make_app();
    upload(&app, &resumes()).await;

    let (status, _) = send(
        &app,
        post_json("/match", &json!({"job_embedding": vec![0.0f32; DIM]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_match_empty_catalog_returns_404() {
    let app = make_app();
    let (status, _) = send(
        &app,
        post_json("/match", &json!({"job_embedding": vec![1.0f32; DIM]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Persistence through the API
// =============================================================================

#[tokio::test]
async fn test_uploads_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let paths = CatalogPaths::new(
        config.vector_snapshot_path(dir.path()),
        config.metadata_snapshot_path(dir.path()),
    );

    let catalog = Arc::new(Catalog::open(paths.clone(), DIM).unwrap());
    let app = create_router(AppState::build(config.clone(), catalog).unwrap());
    upload(&app, &resumes()).await;

    let reopened = Arc::new(Catalog::open(paths, DIM).unwrap());
    assert_eq!(reopened.size(), 3);
    assert_eq!(reopened.record(1).unwrap().display_name, "pastry.docx");

    let app = create_router(AppState::build(config, reopened).unwrap());
    let (status, bytes) = send(
        &app,
        post_json("/match-text", &json!({"text": "chocolate cakes", "top_k": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let resp: TextMatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.results[0].file_name, "pastry.docx");
}

#[tokio::test]
async fn test_explanations_can_be_disabled() {
    let mut config = test_config();
    config.explain.enabled = false;
    let catalog = Arc::new(Catalog::in_memory(DIM).unwrap());
    let app = create_router(AppState::build(config, catalog).unwrap());
    upload(&app, &resumes()).await;

    let (_, bytes) = send(
        &app,
        post_json("/match-text", &json!({"text": "Python pandas"})),
    )
    .await;
    let resp: TextMatchResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(resp.results.iter().all(|r| r.llm_explanation.is_none()));
}
