//! resmatch matching pipeline.
//!
//! The MatchPipeline ties the collaborators to the catalog: documents are
//! embedded and ingested as one batch, and job descriptions are embedded,
//! ranked against the catalog, and annotated with an explanation per row.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use resmatch_core::config::MatchConfig;
use resmatch_core::error::{MatchError, Result};
use resmatch_core::types::{DocumentRecord, NewDocument, RankedMatch};

use crate::catalog::Catalog;
use crate::embedding::DynEmbeddingService;
use crate::explain::DynExplanationService;

/// A document left out of an upload, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub file_name: String,
    pub reason: String,
}

/// Outcome of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents added to the catalog.
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    /// Catalog size after the batch.
    pub total: usize,
}

/// One ranked candidate for a text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub rank: usize,
    pub ordinal: usize,
    pub record: DocumentRecord,
    pub score: f64,
    pub snippet: String,
    /// `None` when explanations are disabled.
    pub explanation: Option<String>,
}

/// Knobs the pipeline reads from `MatchConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub snippet_chars: usize,
    pub uploaded_label: String,
}

impl PipelineSettings {
    pub fn from_config(config: &MatchConfig) -> Self {
        Self {
            default_top_k: config.search.default_top_k,
            max_top_k: config.search.max_top_k,
            snippet_chars: config.search.snippet_chars,
            uploaded_label: config.ingest.uploaded_label.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}

/// Embed, rank, and explain.
pub struct MatchPipeline {
    catalog: Arc<Catalog>,
    embedder: Arc<dyn DynEmbeddingService>,
    explainer: Option<Arc<dyn DynExplanationService>>,
    settings: PipelineSettings,
}

impl MatchPipeline {
    /// Build a pipeline. The embedder must produce vectors of the catalog's
    /// dimension.
    pub fn new(
        catalog: Arc<Catalog>,
        embedder: Arc<dyn DynEmbeddingService>,
        explainer: Option<Arc<dyn DynExplanationService>>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        if embedder.dimensions() != catalog.dimension() {
            return Err(MatchError::DimensionMismatch {
                expected: catalog.dimension(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self {
            catalog,
            embedder,
            explainer,
            settings,
        })
    }

    /// `requested` or the default, clamped to `[1, max_top_k]`.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.default_top_k)
            .clamp(1, self.settings.max_top_k.max(1))
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed_boxed(text).await
    }

    /// Embed and index uploaded documents under the upload label.
    ///
    /// Documents with blank text or name, or whose text cannot be embedded,
    /// are skipped. The rest are ingested as a single batch, so either all of
    /// them land in the catalog or none do.
    pub async fn ingest_documents(&self, documents: Vec<NewDocument>) -> Result<IngestReport> {
        let mut skipped = Vec::new();
        let mut vectors = Vec::new();
        let mut records = Vec::new();

        for doc in documents {
            let reason = if doc.file_name.trim().is_empty() {
                Some("missing file name".to_string())
            } else if doc.text.trim().is_empty() {
                Some("no extractable text".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                warn!(file_name = %doc.file_name, %reason, "Skipping upload");
                skipped.push(SkippedDocument {
                    file_name: doc.file_name,
                    reason,
                });
                continue;
            }

            match self.embed(&doc.text).await {
                Ok(v) => {
                    vectors.push(v);
                    records.push(DocumentRecord::new(
                        doc.file_name,
                        doc.text,
                        self.settings.uploaded_label.clone(),
                    ));
                }
                Err(e) => {
                    warn!(file_name = %doc.file_name, error = %e, "Skipping upload");
                    skipped.push(SkippedDocument {
                        file_name: doc.file_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let indexed = if records.is_empty() {
            0
        } else {
            self.ingest_batch(vectors, records).await?
        };

        Ok(IngestReport {
            indexed,
            skipped,
            total: self.catalog.size(),
        })
    }

    /// Embed and index labelled records as one batch. Any record that cannot
    /// be embedded fails the whole batch.
    pub async fn ingest_records(&self, records: Vec<DocumentRecord>) -> Result<usize> {
        let mut vectors = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let v = self.embed(&record.raw_text).await.map_err(|e| {
                MatchError::InvalidRecord(format!(
                    "record {} ({}): {}",
                    i, record.display_name, e
                ))
            })?;
            vectors.push(v);
        }
        self.ingest_batch(vectors, records).await
    }

    /// Rank the catalog against a precomputed embedding.
    pub fn match_embedding(
        &self,
        embedding: &[f32],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedMatch>> {
        let top_k = self.resolve_top_k(top_k);
        self.catalog.query(embedding, top_k)
    }

    /// Embed a job description, rank the catalog, and explain each result.
    ///
    /// A failed explanation does not fail the query; the row carries a note
    /// instead.
    pub async fn match_text(&self, text: &str, top_k: Option<usize>) -> Result<Vec<CandidateMatch>> {
        let embedding = self.embed(text).await?;
        let ranked = self.match_embedding(&embedding, top_k)?;

        let mut results = Vec::with_capacity(ranked.len());
        for m in ranked {
            let explanation = match &self.explainer {
                Some(explainer) => Some(
                    match explainer.explain_boxed(text, &m.record.raw_text).await {
                        Ok(e) => e,
                        Err(e) => {
                            warn!(ordinal = m.ordinal, error = %e, "Explanation failed");
                            format!("Explanation unavailable: {}", e)
                        }
                    },
                ),
                None => None,
            };
            results.push(CandidateMatch {
                rank: m.rank,
                ordinal: m.ordinal,
                snippet: m.record.snippet(self.settings.snippet_chars).to_string(),
                record: m.record,
                score: m.score,
                explanation,
            });
        }

        debug!(returned = results.len(), "Text query matched");
        Ok(results)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn explanations_enabled(&self) -> bool {
        self.explainer.is_some()
    }

    /// Catalog writes hit the disk, so run them off the async runtime.
    async fn ingest_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        records: Vec<DocumentRecord>,
    ) -> Result<usize> {
        let catalog = Arc::clone(&self.catalog);
        let added = tokio::task::spawn_blocking(move || catalog.ingest(vectors, records))
            .await
            .map_err(|e| MatchError::Storage(format!("Ingest task panicked: {}", e)))??;
        info!(added, total = self.catalog.size(), "Batch indexed");
        Ok(added)
    }
}

impl std::fmt::Debug for MatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchPipeline")
            .field("catalog", &self.catalog)
            .field("dimensions", &self.embedder.dimensions())
            .field("explanations", &self.explainer.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
