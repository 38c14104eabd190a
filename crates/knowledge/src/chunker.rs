//! Document segmentation.
//!
//! Sizes are expressed in tokens and converted to a character budget with
//! a fixed ratio, which keeps segments near the target without a
//! tokenizer dependency.

use arag_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

use crate::types::{ChunkCandidate, Document};

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Split a document into bounded-size segments.
///
/// Every segment inherits the document provenance and records its
/// position. Whitespace-only segments are dropped without consuming a
/// position.
pub fn chunk_document(
    document: &Document,
    chunk_tokens: usize,
    overlap_tokens: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    if document.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let capacity = chunk_tokens.max(1) * CHARS_PER_TOKEN;
    let config = ChunkConfig::new(capacity)
        .with_overlap(overlap_tokens * CHARS_PER_TOKEN)
        .map_err(|e| AppError::Knowledge(format!("Invalid chunk configuration: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunks(&document.text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(position, text)| ChunkCandidate {
            provenance: document.provenance.clone(),
            position: position as u32,
            text: text.to_string(),
        })
        .collect();

    tracing::debug!(
        provenance = %document.provenance,
        "Chunked document into {} segments (capacity: {} chars, overlap: {} tokens)",
        chunks.len(),
        capacity,
        overlap_tokens
    );

    Ok(chunks)
}

/// Stable identity of a segment.
pub fn chunk_id(provenance: &str, position: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provenance.as_bytes());
    hasher.update([0u8]);
    hasher.update(position.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
