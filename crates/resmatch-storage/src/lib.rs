//! resmatch storage crate - metadata table and crash-safe snapshot files.
//!
//! Provides the append-only, CSV-persisted metadata store that sits beside
//! the vector index, and the write-to-temp-then-rename snapshot writer used
//! for both persisted stores.

pub mod metadata;
pub mod snapshot;

pub use metadata::{MetadataStore, METADATA_COLUMNS};
pub use snapshot::{stage, StagedFile};
