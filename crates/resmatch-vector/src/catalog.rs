//! The catalog: a vector store and a metadata store kept in lockstep.
//!
//! The i-th vector and the i-th record describe the same document, so the two
//! stores must always hold the same number of entries. The catalog is the only
//! writer to either store. A single `RwLock` guards both: queries share the
//! read lock, while an ingest holds the write lock from validation through
//! persistence so no reader can observe one store extended without the other.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use resmatch_core::error::{MatchError, Result};
use resmatch_core::types::{DocumentRecord, RankedMatch};
use resmatch_storage::MetadataStore;

use crate::index::VectorStore;
use crate::normalize::normalize;

/// On-disk locations of the two snapshots that make up a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl CatalogPaths {
    pub fn new(vectors: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            vectors: vectors.into(),
            metadata: metadata.into(),
        }
    }
}

#[derive(Debug)]
struct CatalogState {
    vectors: VectorStore,
    metadata: MetadataStore,
    /// Set when the stores (or their snapshots) can no longer be trusted to be
    /// aligned. Ingest is refused until a successful reload clears it.
    desynced: bool,
    #[cfg(test)]
    faults: Faults,
}

/// Storage failures forced by tests at points real I/O rarely fails.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    fail_append: bool,
    fail_vector_restore: bool,
}

impl CatalogState {
    fn empty(dimension: usize) -> Result<Self> {
        Ok(Self {
            vectors: VectorStore::new(dimension)?,
            metadata: MetadataStore::new(),
            desynced: false,
            #[cfg(test)]
            faults: Faults::default(),
        })
    }

    fn rollback(&mut self, len: usize) {
        self.vectors.truncate(len);
        self.metadata.truncate(len);
    }

    fn append_records(&mut self, records: Vec<DocumentRecord>) -> Result<()> {
        #[cfg(test)]
        if self.faults.fail_append {
            return Err(MatchError::Storage("metadata append failed".to_string()));
        }
        self.metadata.append(records)
    }

    /// Rewrite the vector snapshot from the in-memory store.
    fn restore_vectors(&self, path: &Path) -> Result<()> {
        #[cfg(test)]
        if self.faults.fail_vector_restore {
            return Err(MatchError::Storage("vector snapshot restore failed".to_string()));
        }
        self.vectors.save(path)
    }

    fn desync_error(&self) -> MatchError {
        MatchError::StoreDesync {
            vectors: self.vectors.size(),
            records: self.metadata.size(),
        }
    }
}

/// Vector index and metadata table behind one atomic API.
#[derive(Debug)]
pub struct Catalog {
    state: RwLock<CatalogState>,
    paths: Option<CatalogPaths>,
    dimension: usize,
}

impl Catalog {
    /// Create an empty catalog that is never persisted.
    pub fn in_memory(dimension: usize) -> Result<Self> {
        Ok(Self {
            state: RwLock::new(CatalogState::empty(dimension)?),
            paths: None,
            dimension,
        })
    }

    /// Open the catalog persisted at `paths`, or an empty one if neither
    /// snapshot exists yet.
    ///
    /// Fails with `StoreDesync` if only one snapshot exists or the two hold a
    /// different number of entries, and with `DimensionMismatch` if the vector
    /// snapshot was built for another dimension.
    pub fn open(paths: CatalogPaths, dimension: usize) -> Result<Self> {
        let state = load_state(&paths, dimension)?;
        info!(
            vectors = %paths.vectors.display(),
            metadata = %paths.metadata.display(),
            documents = state.vectors.size(),
            dimension,
            "Catalog opened"
        );
        Ok(Self {
            state: RwLock::new(state),
            paths: Some(paths),
            dimension,
        })
    }

    /// Add a batch of documents: `vectors[i]` is the embedding of `records[i]`.
    ///
    /// Vectors are normalized before storage. On success both snapshots are
    /// durably written before this returns. Every failure except
    /// `StoreDesync` leaves the catalog (and its snapshots) unchanged.
    pub fn ingest(&self, vectors: Vec<Vec<f32>>, records: Vec<DocumentRecord>) -> Result<usize> {
        let mut state = self.write()?;

        if state.desynced {
            return Err(state.desync_error());
        }
        if vectors.len() != records.len() {
            return Err(MatchError::BatchSizeMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }
        if let Some((i, _)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.display_name.trim().is_empty())
        {
            return Err(MatchError::InvalidRecord(format!(
                "record {} has an empty display name",
                i
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(0);
        }

        let normalized = vectors
            .iter()
            .map(|v| normalize(v))
            .collect::<Result<Vec<_>>>()?;

        let before = state.vectors.size();
        let added = state.vectors.add(&normalized)?;

        if let Err(e) = state.append_records(records) {
            // Readers must never see the extra vectors, but the stores are no
            // longer trusted until reloaded from disk.
            let err = state.desync_error();
            state.rollback(before);
            state.desynced = true;
            error!(error = %e, desync = %err, "Metadata append failed after vectors were added");
            return Err(err);
        }

        if let Some(paths) = &self.paths {
            persist_ingest(&mut state, paths, before)?;
        }

        info!(added, total = state.vectors.size(), "Documents ingested");
        Ok(added)
    }

    /// Rank stored documents by cosine similarity to `embedding`.
    ///
    /// Returns `min(top_k, size())` matches, best first, ties in ingest order.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RankedMatch>> {
        let state = self.read()?;

        if state.vectors.is_empty() {
            return Err(MatchError::EmptyCatalog);
        }
        if embedding.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let query = normalize(embedding)?;
        let hits = state.vectors.search(&query, top_k)?;

        let matches = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                Ok(RankedMatch {
                    ordinal: hit.ordinal,
                    record: state.metadata.get(hit.ordinal)?.clone(),
                    score: hit.score,
                    rank: i + 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(top_k, returned = matches.len(), "Catalog query");
        Ok(matches)
    }

    /// Number of indexed documents.
    pub fn size(&self) -> usize {
        self.state
            .read()
            .map(|s| s.vectors.size())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn paths(&self) -> Option<&CatalogPaths> {
        self.paths.as_ref()
    }

    /// True once the catalog has detected misaligned stores or snapshots.
    pub fn is_desynced(&self) -> bool {
        self.state.read().map(|s| s.desynced).unwrap_or(true)
    }

    /// The record stored at `ordinal`.
    pub fn record(&self, ordinal: usize) -> Result<DocumentRecord> {
        Ok(self.read()?.metadata.get(ordinal)?.clone())
    }

    /// The normalized vector stored at `ordinal`.
    pub fn vector(&self, ordinal: usize) -> Result<Vec<f32>> {
        let state = self.read()?;
        state
            .vectors
            .vector(ordinal)
            .map(|v| v.to_vec())
            .ok_or(MatchError::OutOfRange {
                ordinal,
                size: state.vectors.size(),
            })
    }

    /// Write both snapshots. No-op for an in-memory catalog.
    ///
    /// Refused with `StoreDesync` while the catalog is desynced, so a
    /// misaligned pair is never written over the last good snapshots.
    pub fn flush(&self) -> Result<()> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        let mut state = self.write()?;
        if state.desynced {
            return Err(state.desync_error());
        }

        // Outside a desync an existing vector snapshot already matches memory,
        // so only a snapshot created here can end up without its partner.
        let vectors_existed = paths.vectors.exists();
        let staged_vectors = state.vectors.stage(&paths.vectors)?;
        let staged_metadata = state.metadata.stage(&paths.metadata)?;
        staged_vectors.commit()?;
        if let Err(e) = staged_metadata.commit() {
            warn!(error = %e, "Failed to commit metadata snapshot during flush");
            if !vectors_existed {
                if let Err(remove) = std::fs::remove_file(&paths.vectors) {
                    state.desynced = true;
                    let err = MatchError::StoreDesync {
                        vectors: state.vectors.size(),
                        records: 0,
                    };
                    error!(
                        error = %remove,
                        desync = %err,
                        "Lone vector snapshot could not be removed"
                    );
                    return Err(err);
                }
            }
            return Err(e);
        }

        info!(documents = state.vectors.size(), "Catalog flushed");
        Ok(())
    }

    /// Replace the in-memory stores with the persisted snapshots and clear
    /// the desync flag. This is the recovery path after `StoreDesync`.
    pub fn reload(&self) -> Result<()> {
        let Some(paths) = &self.paths else {
            return Err(MatchError::Storage(
                "in-memory catalog has no snapshots to reload".to_string(),
            ));
        };
        let mut state = self.write()?;
        *state = load_state(paths, self.dimension)?;
        info!(documents = state.vectors.size(), "Catalog reloaded from snapshots");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|e| MatchError::Storage(format!("Catalog lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|e| MatchError::Storage(format!("Catalog lock poisoned: {}", e)))
    }

    #[cfg(test)]
    fn mark_desynced(&self) {
        self.state.write().unwrap().desynced = true;
    }

    #[cfg(test)]
    fn inject_faults(&self, faults: Faults) {
        self.state.write().unwrap().faults = faults;
    }
}

/// Persist both stores after an in-memory ingest, undoing the ingest on
/// failure.
///
/// Both snapshots are staged before either is committed, so an error while
/// writing leaves the previous pair on disk. The only window for a mismatched
/// pair is between the two renames; it is closed by rewriting the previous
/// vector snapshot, and if that also fails the catalog is marked desynced.
fn persist_ingest(state: &mut CatalogState, paths: &CatalogPaths, before: usize) -> Result<()> {
    let staged = state
        .vectors
        .stage(&paths.vectors)
        .and_then(|v| Ok((v, state.metadata.stage(&paths.metadata)?)));
    let (staged_vectors, staged_metadata) = match staged {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "Failed to stage snapshots, rolling back ingest");
            state.rollback(before);
            return Err(e);
        }
    };

    if let Err(e) = staged_vectors.commit() {
        warn!(error = %e, "Failed to commit vector snapshot, rolling back ingest");
        state.rollback(before);
        return Err(e);
    }

    if let Err(e) = staged_metadata.commit() {
        let persisted_vectors = state.vectors.size();
        state.rollback(before);
        warn!(error = %e, "Failed to commit metadata snapshot, restoring vector snapshot");

        if let Err(restore) = state.restore_vectors(&paths.vectors) {
            state.desynced = true;
            let err = MatchError::StoreDesync {
                vectors: persisted_vectors,
                records: before,
            };
            error!(
                error = %restore,
                desync = %err,
                "Vector snapshot could not be restored; snapshots are misaligned"
            );
            return Err(err);
        }
        return Err(e);
    }

    Ok(())
}

fn load_state(paths: &CatalogPaths, dimension: usize) -> Result<CatalogState> {
    let vectors_exist = paths.vectors.exists();
    let metadata_exist = paths.metadata.exists();

    if !vectors_exist && !metadata_exist {
        return CatalogState::empty(dimension);
    }

    let vectors = if vectors_exist {
        Some(load_vectors(&paths.vectors, dimension)?)
    } else {
        None
    };
    let metadata = if metadata_exist {
        Some(MetadataStore::load(&paths.metadata)?)
    } else {
        None
    };

    match (vectors, metadata) {
        (Some(vectors), Some(metadata)) if vectors.size() == metadata.size() => Ok(CatalogState {
            vectors,
            metadata,
            desynced: false,
            #[cfg(test)]
            faults: Faults::default(),
        }),
        (vectors, metadata) => {
            let err = MatchError::StoreDesync {
                vectors: vectors.map(|v| v.size()).unwrap_or(0),
                records: metadata.map(|m| m.size()).unwrap_or(0),
            };
            error!(desync = %err, "Persisted snapshots are misaligned");
            Err(err)
        }
    }
}

fn load_vectors(path: &Path, dimension: usize) -> Result<VectorStore> {
    let store = VectorStore::load(path)?;
    if store.dimension() != dimension {
        return Err(MatchError::DimensionMismatch {
            expected: dimension,
            actual: store.dimension(),
        });
    }
    Ok(store)
}
