//! Embedding service trait and implementations.
//!
//! - `OnnxEmbedding` runs a sentence-transformer exported to ONNX (for
//!   example all-MiniLM-L6-v2) through ort, tokenizing with the HuggingFace
//!   tokenizers crate. Selected when a model directory is configured.
//! - `HashingEmbedding` is a deterministic feature-hashing bag-of-words
//!   embedder. Documents that share vocabulary land close together, which is
//!   enough to rank resumes against a job description without a model file.
//! - `MockEmbedding` returns pseudo-random but repeatable vectors for tests
//!   that only care about plumbing.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use sha2::{Digest, Sha256};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use resmatch_core::error::MatchError;

use crate::normalize::normalize_in_place;
use crate::tokens;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors. The same
/// service must be used for indexing and for queries.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, MatchError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, so it is not object-safe.
/// This trait boxes the future instead, allowing `Arc<dyn DynEmbeddingService>`
/// to be stored in shared state. Every `EmbeddingService` gets it for free.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, MatchError>> + Send + 'a>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, MatchError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbedding - sentence-transformer inference through ONNX Runtime
// ---------------------------------------------------------------------------

/// Width assumed when the model does not declare its output dimension.
const FALLBACK_DIMENSIONS: usize = 384;

/// Sentence-transformer embedder backed by ONNX Runtime.
///
/// The model directory must hold `model.onnx` and `tokenizer.json`. The model
/// takes `input_ids`, `attention_mask` and `token_type_ids` as i64 tensors of
/// shape `[1, seq_len]`. Token-level output (`[1, seq_len, hidden]`) is mean
/// pooled over the attention mask; already pooled output (`[1, hidden]`) is
/// used as is. Either way the vector is L2-normalized.
#[derive(Clone)]
pub struct OnnxEmbedding {
    model: Arc<OnnxModel>,
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
}

// ort::Session is Send + Sync internally; runs are serialized by the mutex.
unsafe impl Send for OnnxModel {}
unsafe impl Sync for OnnxModel {}

impl std::fmt::Debug for OnnxEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedding")
            .field("dimensions", &self.model.dimensions)
            .finish()
    }
}

impl OnnxEmbedding {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// Inputs longer than `max_tokens` are truncated by the tokenizer.
    pub fn from_directory(model_dir: &Path, max_tokens: usize) -> Result<Self, MatchError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            max_tokens,
        )
    }

    /// Load from explicit model and tokenizer paths.
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        max_tokens: usize,
    ) -> Result<Self, MatchError> {
        if !model_path.exists() {
            return Err(MatchError::Embedding(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(MatchError::Embedding(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }
        if max_tokens == 0 {
            return Err(MatchError::Config(
                "embedding.max_tokens must be greater than zero".to_string(),
            ));
        }

        let session = Session::builder()
            .map_err(|e| MatchError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| MatchError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| MatchError::Embedding(format!("ONNX load model: {}", e)))?;

        // Last axis of the first output, when the export declares it.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .and_then(|d| usize::try_from(d).ok())
            .filter(|&d| d > 0)
            .unwrap_or(FALLBACK_DIMENSIONS);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| MatchError::Embedding(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| MatchError::Embedding(format!("Tokenizer truncation: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            max_tokens,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                dimensions,
            }),
        })
    }
}

impl OnnxModel {
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        if text.trim().is_empty() {
            return Err(MatchError::Embedding("Cannot embed empty text".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| MatchError::Embedding(format!("Tokenization failed: {}", e)))?;

        let widen = |values: &[u32]| values.iter().map(|&v| i64::from(v)).collect::<Vec<_>>();
        let attention_mask = widen(encoding.get_attention_mask());
        let seq_len = attention_mask.len();

        let as_batch = |name: &str, values: Vec<i64>| {
            ndarray::Array2::from_shape_vec((1, seq_len), values)
                .map_err(|e| MatchError::Embedding(format!("{} array: {}", name, e)))
        };
        let ids_array = as_batch("input_ids", widen(encoding.get_ids()))?;
        let mask_array = as_batch("attention_mask", attention_mask.clone())?;
        let type_array = as_batch("token_type_ids", widen(encoding.get_type_ids()))?;

        let tensor_err = |e: ort::Error| MatchError::Embedding(format!("Input tensor: {}", e));
        let ids_ref = TensorRef::from_array_view(&ids_array).map_err(tensor_err)?;
        let mask_ref = TensorRef::from_array_view(&mask_array).map_err(tensor_err)?;
        let type_ref = TensorRef::from_array_view(&type_array).map_err(tensor_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| MatchError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| MatchError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| MatchError::Embedding(format!("Extract embeddings: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let mut pooled = match dims.as_slice() {
            [1, hidden] if *hidden as usize == self.dimensions => data.to_vec(),
            [1, tokens, hidden]
                if *hidden as usize == self.dimensions && *tokens as usize == seq_len =>
            {
                mean_pool(data, &attention_mask, self.dimensions)
            }
            _ => {
                return Err(MatchError::Embedding(format!(
                    "Unexpected output shape {:?} for {} tokens of width {}",
                    dims, seq_len, self.dimensions
                )))
            }
        };

        normalize_in_place(&mut pooled).map_err(|e| {
            MatchError::Embedding(format!("Model produced an unusable vector: {}", e))
        })?;
        debug!(tokens = seq_len, dimensions = self.dimensions, "Text embedded");
        Ok(pooled)
    }
}

/// Average the token rows of `data` whose attention mask is set.
fn mean_pool(data: &[f32], attention_mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (row, _) in data
        .chunks_exact(hidden)
        .zip(attention_mask)
        .filter(|(_, mask)| **mask > 0)
    {
        for (acc, &v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        for v in &mut pooled {
            *v /= count;
        }
    }
    pooled
}

impl EmbeddingService for OnnxEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        // Inference is CPU-bound.
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || model.embed_sync(&text))
            .await
            .map_err(|e| MatchError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - signed feature hashing over words
// ---------------------------------------------------------------------------

/// Feature-hashing embedder.
///
/// Each keyword is hashed with SHA-256; the first eight bytes pick a bucket
/// and the ninth a sign, and the word's count is added to that bucket. Text
/// made only of stopwords falls back to hashing every word. The result is
/// L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Result<Self, MatchError> {
        if dimensions == 0 {
            return Err(MatchError::Config(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        if text.trim().is_empty() {
            return Err(MatchError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut terms: Vec<String> = tokens::keywords(text).collect();
        if terms.is_empty() {
            terms = tokens::words(text).collect();
        }
        if terms.is_empty() {
            return Err(MatchError::Embedding(
                "Text contains no words to embed".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for term in &terms {
            let (bucket, sign) = self.slot(term);
            vector[bucket] += sign;
        }

        // Opposite signs can cancel out for tiny inputs.
        normalize_in_place(&mut vector).map_err(|_| {
            MatchError::Embedding("Text hashed to a zero vector".to_string())
        })?;

        debug!(terms = terms.len(), dimensions = self.dimensions, "Text embedded");
        Ok(vector)
    }

    fn slot(&self, term: &str) -> (usize, f32) {
        let digest = Sha256::digest(term.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(prefix) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service returning deterministic unit vectors.
///
/// The output depends only on the exact input text, so identical inputs give
/// identical vectors and anything else is effectively unrelated.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update((i as u64).to_le_bytes());
            let digest = hasher.finalize();
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(prefix);
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        if text.is_empty() {
            return Err(MatchError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
