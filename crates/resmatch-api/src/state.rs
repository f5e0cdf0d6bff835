//! Application state shared across all route handlers.
//!
//! AppState holds the catalog, the matching pipeline, and the configuration.
//! It is passed to handlers via axum's State extractor.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use resmatch_core::config::MatchConfig;
use resmatch_core::error::Result;
use resmatch_vector::{
    Catalog, DynEmbeddingService, DynExplanationService, HashingEmbedding, KeywordExplainer,
    MatchPipeline, OnnxEmbedding, PipelineSettings,
};
use tracing::info;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<MatchConfig>,
    /// The single catalog instance, also held by the pipeline.
    pub catalog: Arc<Catalog>,
    pub pipeline: Arc<MatchPipeline>,
    /// Monotonic start time for uptime calculation.
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around an already assembled pipeline.
    pub fn new(config: MatchConfig, pipeline: MatchPipeline) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::clone(pipeline.catalog()),
            pipeline: Arc::new(pipeline),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Wire the default collaborators around `catalog`.
    ///
    /// The embedder is the ONNX model under `embedding.model_dir` when one is
    /// configured, otherwise the hashing embedder at the index dimension. The
    /// keyword explainer is attached unless explanations are disabled.
    pub fn build(config: MatchConfig, catalog: Arc<Catalog>) -> Result<Self> {
        let embedder: Arc<dyn DynEmbeddingService> = match config.embedding.model_dir {
            Some(ref dir) => Arc::new(OnnxEmbedding::from_directory(
                Path::new(dir),
                config.embedding.max_tokens,
            )?),
            None => {
                info!(
                    dimensions = config.index.dimension,
                    "No embedding model configured, using hashing embedder"
                );
                Arc::new(HashingEmbedding::new(config.index.dimension)?)
            }
        };
        let explainer: Option<Arc<dyn DynExplanationService>> = if config.explain.enabled {
            Some(Arc::new(KeywordExplainer::from_config(&config.explain)))
        } else {
            None
        };
        let pipeline = MatchPipeline::new(
            catalog,
            embedder,
            explainer,
            PipelineSettings::from_config(&config),
        )?;
        Ok(Self::new(config, pipeline))
    }
}
