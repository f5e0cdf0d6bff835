//! resmatch vector crate - flat similarity index, catalog, embedding,
//! explanation, and the matching pipeline.
//!
//! Provides the L2 normalizer, the exact brute-force `VectorStore`, the
//! `Catalog` that keeps vectors and metadata records aligned and persisted,
//! the embedding and explanation service traits with deterministic
//! implementations, and the `MatchPipeline` that drives them.

pub mod catalog;
pub mod embedding;
pub mod explain;
pub mod index;
pub mod normalize;
pub mod pipeline;
pub mod tokens;

pub use catalog::{Catalog, CatalogPaths};
pub use embedding::{
    DynEmbeddingService, EmbeddingService, HashingEmbedding, MockEmbedding, OnnxEmbedding,
};
pub use explain::{DynExplanationService, ExplanationService, KeywordExplainer};
pub use index::{SearchHit, VectorStore};
pub use normalize::{normalize, normalize_in_place};
pub use pipeline::{CandidateMatch, IngestReport, MatchPipeline, PipelineSettings, SkippedDocument};
