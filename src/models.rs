//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A bounded slice of a document's extracted text — the unit that gets embedded.
///
/// Offsets are character positions of the window the chunk was cut from
/// (before trimming), so `end_offset > start_offset` always holds and
/// consecutive chunks overlap when overlap is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Zero-based running counter over accepted (non-empty) chunks of one document.
    pub chunk_id: i64,
    /// Trimmed window text.
    pub text: String,
    /// Character offset where the window starts.
    pub start_offset: usize,
    /// Character offset one past where the window ends.
    pub end_offset: usize,
}

/// Metadata stored alongside each vector in the index.
///
/// Entry *i* of the metadata list describes vector *i* of the index; the two
/// collections are parallel arrays and are only ever mutated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: i64,
    pub chunk_id: i64,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl ChunkMetadata {
    /// Build the metadata record for a chunk of the given document.
    pub fn from_chunk(document_id: i64, chunk: &Chunk) -> Self {
        Self {
            document_id,
            chunk_id: chunk.chunk_id,
            text: chunk.text.clone(),
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
        }
    }
}

/// A single nearest-neighbor search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub metadata: ChunkMetadata,
    /// Squared L2 distance between the normalized query and stored vector
    /// (smaller is closer).
    pub distance: f32,
}
