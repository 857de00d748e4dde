//! Core data models.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the indexing and question-answering pipeline.

use serde::Serialize;

/// Document metadata row. `path` is relative to the configured storage root
/// and resolves to a readable binary while the record exists; timestamps
/// are UTC epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored chunk of a document's extracted text, with its embedding vector
/// encoded as a little-endian f32 BLOB.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<u8>,
}

/// Final answer payload returned by the answer engine.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Preview of the context the answer was conditioned on (≤500 chars).
    pub context: String,
    pub similarity: f64,
    pub provider: String,
}
