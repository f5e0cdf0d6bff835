//! Append-only table of document records, positionally aligned with the
//! vector store.
//!
//! The persisted form is a CSV file with one row per ordinal, written in
//! ordinal order. Row order is the alignment with the vector snapshot, so the
//! file must never be re-sorted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use resmatch_core::error::{MatchError, Result};
use resmatch_core::types::DocumentRecord;

use crate::snapshot::{self, StagedFile};

/// Column header of the metadata table, in write order.
pub const METADATA_COLUMNS: [&str; 3] = ["file_name", "text", "predicted_role"];

/// Ordered, append-only collection of [`DocumentRecord`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<DocumentRecord>,
}

impl MetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records in order. The first receives ordinal `size()`.
    pub fn append(&mut self, records: Vec<DocumentRecord>) -> Result<()> {
        self.records.extend(records);
        Ok(())
    }

    /// Look up the record at `ordinal`.
    pub fn get(&self, ordinal: usize) -> Result<&DocumentRecord> {
        self.records.get(ordinal).ok_or(MatchError::OutOfRange {
            ordinal,
            size: self.records.len(),
        })
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.iter()
    }

    /// Drop every record at or beyond `len`.
    ///
    /// Only used to undo an ingest whose persistence failed; the store is
    /// otherwise append-only.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Persist the table, replacing any previous snapshot at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.stage(path)?.commit()?;
        info!(path = %path.display(), records = self.records.len(), "Metadata snapshot saved");
        Ok(())
    }

    /// Write the table to a staged temporary file without replacing `path`.
    pub fn stage(&self, path: &Path) -> Result<StagedFile> {
        snapshot::stage(path, |w| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(w);
            writer
                .write_record(METADATA_COLUMNS)
                .map_err(|e| MatchError::Storage(format!("Failed to write metadata: {}", e)))?;
            for record in &self.records {
                writer
                    .serialize(record)
                    .map_err(|e| MatchError::Storage(format!("Failed to write metadata: {}", e)))?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Load a table previously written by [`MetadataStore::save`] or any CSV
    /// with the `file_name,text,predicted_role` columns.
    ///
    /// Fails with `CorruptMetadata` if the header lacks a required column or
    /// any row has the wrong number of fields or cannot be decoded.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        for column in METADATA_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(MatchError::CorruptMetadata(format!(
                    "{}: missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let mut records = Vec::new();
        for (row, result) in reader.deserialize::<DocumentRecord>().enumerate() {
            let record = result.map_err(|e| {
                MatchError::CorruptMetadata(format!("{}: row {}: {}", path.display(), row, e))
            })?;
            records.push(record);
        }

        info!(path = %path.display(), records = records.len(), "Metadata snapshot loaded");
        Ok(Self { records })
    }
}
