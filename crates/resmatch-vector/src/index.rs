//! Flat in-memory vector store with exact top-k inner-product search.
//!
//! Vectors live in one contiguous `Vec<f32>` of `count * dimension` floats;
//! the i-th vector occupies `[i * dimension, (i + 1) * dimension)`. Search is a
//! brute-force scan, which is exact and fast enough for tens of thousands of
//! resumes.

use std::cmp::Ordering;
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::info;

use resmatch_core::error::{MatchError, Result};
use resmatch_storage::snapshot::{self, StagedFile};

/// Leading bytes of every vector snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"RMVS";
const SNAPSHOT_VERSION: u32 = 1;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the matching vector in the store.
    pub ordinal: usize,
    /// Inner product with the query; cosine similarity for unit vectors.
    pub score: f64,
}

/// Append-only store of fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    magic: [u8; 4],
    version: u32,
    dimension: u64,
    count: u64,
    vectors: &'a [f32],
}

#[derive(Deserialize)]
struct Snapshot {
    magic: [u8; 4],
    version: u32,
    dimension: u64,
    count: u64,
    vectors: Vec<f32>,
}

impl VectorStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MatchError::Config(
                "vector dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Append vectors; the first receives ordinal `size()`.
    ///
    /// Every vector must have exactly `dimension()` components. On a mismatch
    /// nothing is added. Callers are responsible for normalizing first.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<usize> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(vectors.len())
    }

    /// Find the `top_k` stored vectors with the highest inner product.
    ///
    /// Returns `min(top_k, size())` hits ordered by descending score, with
    /// equal scores ordered by ascending ordinal.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Err(MatchError::EmptyStore);
        }
        if query.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = top_k.min(self.size());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, stored)| SearchHit {
                ordinal,
                score: dot(query, stored),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, rank_order);
            hits.truncate(k);
        }
        hits.sort_by(rank_order);

        Ok(hits)
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The vector stored at `ordinal`, if any.
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Drop every vector at or beyond `len`. Used to undo a failed ingest.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }

    /// Persist all vectors, replacing any previous snapshot at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.stage(path)?.commit()?;
        info!(path = %path.display(), vectors = self.size(), "Vector snapshot saved");
        Ok(())
    }

    /// Write the snapshot to a staged temporary file without replacing `path`.
    pub fn stage(&self, path: &Path) -> Result<StagedFile> {
        let snapshot = SnapshotRef {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            dimension: self.dimension as u64,
            count: self.size() as u64,
            vectors: &self.data,
        };
        snapshot::stage(path, |w| {
            bincode::serialize_into(w, &snapshot).map_err(|e| {
                MatchError::Storage(format!("Failed to write vector snapshot: {}", e))
            })
        })
    }

    /// Load a snapshot written by [`VectorStore::save`].
    ///
    /// Fails with `CorruptSnapshot` if the header is wrong or the stored
    /// dimension and count disagree with the number of floats present.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        // Same layout `bincode::serialize_into` writes, but the payload must
        // end exactly where the file does.
        let snapshot: Snapshot = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(&bytes)?;

        if snapshot.magic != SNAPSHOT_MAGIC {
            return Err(MatchError::CorruptSnapshot(format!(
                "{}: not a vector snapshot",
                path.display()
            )));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MatchError::CorruptSnapshot(format!(
                "{}: unsupported snapshot version {}",
                path.display(),
                snapshot.version
            )));
        }
        if snapshot.dimension == 0 {
            return Err(MatchError::CorruptSnapshot(format!(
                "{}: zero dimension",
                path.display()
            )));
        }

        let expected = snapshot
            .count
            .checked_mul(snapshot.dimension)
            .and_then(|n| usize::try_from(n).ok());
        if expected != Some(snapshot.vectors.len()) {
            return Err(MatchError::CorruptSnapshot(format!(
                "{}: header says {} x {} floats but payload holds {}",
                path.display(),
                snapshot.count,
                snapshot.dimension,
                snapshot.vectors.len()
            )));
        }

        let store = Self {
            dimension: snapshot.dimension as usize,
            data: snapshot.vectors,
        };
        info!(
            path = %path.display(),
            vectors = store.size(),
            dimension = store.dimension,
            "Vector snapshot loaded"
        );
        Ok(store)
    }
}

/// Descending score, then ascending ordinal.
fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}
