//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its JSON body, calls into the matching pipeline, and
//! returns a typed JSON response. Failures are returned as `ApiError`, never
//! as an empty result list.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resmatch_core::types::NewDocument;
use resmatch_vector::SkippedDocument;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub job_embedding: Vec<f32>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MatchTextRequest {
    pub text: String,
    pub top_k: Option<usize>,
}

/// Resumes whose text has already been extracted from the uploaded files.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub documents: Vec<NewDocument>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub started_at: DateTime<Utc>,
    pub indexed_documents: usize,
    pub dimension: usize,
    pub desynced: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub dimension: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResult {
    pub rank: usize,
    pub resume_index: usize,
    pub similarity_score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    pub top_k: usize,
    pub results: Vec<MatchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextMatchResult {
    pub rank: usize,
    pub file_name: String,
    pub predicted_role: String,
    pub similarity_score: f64,
    pub resume_snippet: String,
    pub llm_explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextMatchResponse {
    pub top_k: usize,
    pub results: Vec<TextMatchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    /// Catalog size after the upload.
    pub total: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - liveness plus catalog status.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let desynced = state.catalog.is_desynced();
    Json(HealthResponse {
        status: if desynced { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        started_at: state.started_at,
        indexed_documents: state.catalog.size(),
        dimension: state.catalog.dimension(),
        desynced,
    })
}

/// POST /embed - embed raw text.
pub async fn embed(
    State(state): State<AppState>,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(body) = body?;
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("'text' must not be empty".to_string()));
    }

    let embedding = state.pipeline.embed(&body.text).await?;
    Ok(Json(EmbedResponse {
        dimension: embedding.len(),
        embedding,
    }))
}

/// POST /match - rank resumes against a precomputed job embedding.
pub async fn match_candidates(
    State(state): State<AppState>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, ApiError> {
    let Json(body) = body?;
    let top_k = state.pipeline.resolve_top_k(body.top_k);

    let results = state
        .pipeline
        .match_embedding(&body.job_embedding, Some(top_k))?
        .into_iter()
        .map(|m| MatchResult {
            rank: m.rank,
            resume_index: m.ordinal,
            similarity_score: m.score,
        })
        .collect();

    Ok(Json(MatchResponse { top_k, results }))
}

/// POST /match-text - embed a job description, rank, and explain.
pub async fn match_text(
    State(state): State<AppState>,
    body: Result<Json<MatchTextRequest>, JsonRejection>,
) -> Result<Json<TextMatchResponse>, ApiError> {
    let Json(body) = body?;
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("'text' must not be empty".to_string()));
    }
    let top_k = state.pipeline.resolve_top_k(body.top_k);

    let results = state
        .pipeline
        .match_text(&body.text, Some(top_k))
        .await?
        .into_iter()
        .map(|c| TextMatchResult {
            rank: c.rank,
            file_name: c.record.display_name,
            predicted_role: c.record.predicted_label,
            similarity_score: c.score,
            resume_snippet: c.snippet,
            llm_explanation: c.explanation,
        })
        .collect();

    Ok(Json(TextMatchResponse { top_k, results }))
}

/// POST /upload-resumes - index a batch of extracted resumes.
pub async fn upload_resumes(
    State(state): State<AppState>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let Json(body) = body?;
    let report = state.pipeline.ingest_documents(body.documents).await?;

    let message = if report.indexed == 0 {
        "No valid resumes found.".to_string()
    } else {
        format!("{} resumes uploaded and indexed successfully.", report.indexed)
    };

    Ok(Json(UploadResponse {
        message,
        indexed: report.indexed,
        skipped: report.skipped,
        total: report.total,
    }))
}
