use thiserror::Error;

/// Top-level error type for the resmatch system.
///
/// The catalog variants (`DimensionMismatch` through `StoreDesync`) describe
/// failures of the vector/metadata co-store. Every one of them except
/// `StoreDesync` leaves the catalog exactly as it was before the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MatchError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store is empty")]
    EmptyStore,

    #[error("Catalog is empty: no documents have been indexed")]
    EmptyCatalog,

    #[error("Ordinal {ordinal} out of range for store of size {size}")]
    OutOfRange { ordinal: usize, size: usize },

    #[error("Batch size mismatch: {vectors} vectors but {records} records")]
    BatchSizeMismatch { vectors: usize, records: usize },

    #[error("Cannot normalize a zero vector")]
    ZeroVector,

    #[error("Vector contains a non-finite component")]
    NonFiniteVector,

    #[error("Invalid document record: {0}")]
    InvalidRecord(String),

    #[error("Corrupt vector snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error(
        "Store desync: {vectors} vectors but {records} records; reload from snapshots required"
    )]
    StoreDesync { vectors: usize, records: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Explanation error: {0}")]
    Explanation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MatchError {
    /// True for errors that leave the catalog unusable for writes until it is
    /// reloaded from a known-good pair of snapshots.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::StoreDesync { .. })
    }
}

impl From<toml::de::Error> for MatchError {
    fn from(err: toml::de::Error) -> Self {
        MatchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MatchError {
    fn from(err: toml::ser::Error) -> Self {
        MatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MatchError {
    fn from(err: serde_json::Error) -> Self {
        MatchError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for MatchError {
    fn from(err: csv::Error) -> Self {
        MatchError::CorruptMetadata(err.to_string())
    }
}

impl From<bincode::Error> for MatchError {
    fn from(err: bincode::Error) -> Self {
        MatchError::CorruptSnapshot(err.to_string())
    }
}

/// A specialized `Result` type for resmatch operations.
pub type Result<T> = std::result::Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MatchError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 3");
    }

    #[test]
    fn test_error_display_catalog_variants() {
        let cases: Vec<(MatchError, &str)> = vec![
            (MatchError::EmptyStore, "Vector store is empty"),
            (
                MatchError::EmptyCatalog,
                "Catalog is empty: no documents have been indexed",
            ),
            (
                MatchError::OutOfRange { ordinal: 7, size: 3 },
                "Ordinal 7 out of range for store of size 3",
            ),
            (
                MatchError::BatchSizeMismatch {
                    vectors: 2,
                    records: 3,
                },
                "Batch size mismatch: 2 vectors but 3 records",
            ),
            (MatchError::ZeroVector, "Cannot normalize a zero vector"),
            (
                MatchError::CorruptSnapshot("truncated".to_string()),
                "Corrupt vector snapshot: truncated",
            ),
            (
                MatchError::CorruptMetadata("row 4".to_string()),
                "Corrupt metadata: row 4",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_only_desync_is_fatal() {
        assert!(MatchError::StoreDesync {
            vectors: 4,
            records: 3
        }
        .is_fatal());
        assert!(!MatchError::EmptyCatalog.is_fatal());
        assert!(!MatchError::ZeroVector.is_fatal());
        assert!(!MatchError::CorruptSnapshot("x".into()).is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MatchError = io_err.into();
        assert!(matches!(err, MatchError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let match_err: MatchError = err.unwrap_err().into();
        assert!(matches!(match_err, MatchError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let match_err: MatchError = err.unwrap_err().into();
        assert!(matches!(match_err, MatchError::Serialization(_)));
    }

    #[test]
    fn test_error_from_bincode_is_corrupt_snapshot() {
        let err = bincode::deserialize::<Vec<f32>>(&[1, 2]).unwrap_err();
        let match_err: MatchError = err.into();
        assert!(matches!(match_err, MatchError::CorruptSnapshot(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
