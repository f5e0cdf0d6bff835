use serde::{Deserialize, Serialize};

// =============================================================================
// Documents
// =============================================================================

/// Per-document metadata held alongside each indexed vector.
///
/// A record has no identity of its own: its ordinal position in the metadata
/// store is the only link to the vector at the same ordinal. Column names
/// follow the persisted resume table (`file_name,text,predicted_role`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Name shown to the user, usually the uploaded file name.
    #[serde(rename = "file_name")]
    pub display_name: String,
    /// Full extracted document text.
    #[serde(rename = "text")]
    pub raw_text: String,
    /// Role or category label predicted for the document.
    #[serde(rename = "predicted_role")]
    pub predicted_label: String,
}

impl DocumentRecord {
    pub fn new(
        display_name: impl Into<String>,
        raw_text: impl Into<String>,
        predicted_label: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            raw_text: raw_text.into(),
            predicted_label: predicted_label.into(),
        }
    }

    /// First `max_chars` characters of the document text.
    pub fn snippet(&self, max_chars: usize) -> &str {
        match self.raw_text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &self.raw_text[..byte_idx],
            None => &self.raw_text,
        }
    }
}

/// A document submitted for indexing, before it has an embedding or a label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub file_name: String,
    pub text: String,
}

// =============================================================================
// Query results
// =============================================================================

/// One row of a catalog query: the joined record, its similarity, and its
/// 1-based rank in the result list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    /// Zero-based position of the matched document in the catalog.
    pub ordinal: usize,
    pub record: DocumentRecord,
    /// Cosine similarity between the query and the stored vector.
    pub score: f64,
    pub rank: usize,
}
