//! Evidence store type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of retrieved or web-sourced content plus where it came from.
///
/// Never mutated after creation. Web results carry no provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceChunk {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl EvidenceChunk {
    pub fn new(text: impl Into<String>, provenance: Option<String>) -> Self {
        Self {
            text: text.into(),
            provenance,
        }
    }
}

/// An ingestion unit: arbitrarily long text from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,

    /// Identifier every segment of this document inherits
    pub provenance: String,
}

impl Document {
    pub fn new(text: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provenance: provenance.into(),
        }
    }
}

/// Segment of a document before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCandidate {
    pub provenance: String,
    pub position: u32,
    pub text: String,
}

/// A segment as persisted in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// SHA-256 over provenance, position, and text
    pub id: String,

    pub provenance: String,

    /// Position within the source document
    pub position: u32,

    pub text: String,

    /// Embedding vector
    pub embedding: Vec<f32>,
}

impl From<StoredChunk> for EvidenceChunk {
    fn from(chunk: StoredChunk) -> Self {
        EvidenceChunk {
            text: chunk.text,
            provenance: Some(chunk.provenance),
        }
    }
}

/// Result of an `add` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddStats {
    /// Documents received
    pub documents: u32,

    /// Segments written to the index
    pub chunks: u32,

    /// Whether topic extraction succeeded
    pub topics_updated: bool,

    /// Topics that were not in the set before this add
    pub new_topics: Vec<String>,
}

/// Statistics for the evidence index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct provenances
    pub documents: u32,

    pub chunks: u32,

    pub topics: u32,

    /// Database size in bytes
    pub db_size_bytes: u64,

    pub last_ingested_at: Option<DateTime<Utc>>,
}
