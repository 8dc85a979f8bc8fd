//! Core data models used throughout docqa.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};

/// A markdown source document loaded from the corpus root.
///
/// Identified by its path relative to the corpus root; immutable for the
/// lifetime of an ingestion run.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub relative_path: String,
    pub content: String,
}

/// Metadata stored alongside each chunk in the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the originating document, relative to the corpus root.
    pub source: String,
    pub filename: String,
    /// Section name the chunk belongs to (`"(intro)"` for the preamble).
    pub section: String,
    pub chunk_index: i64,
}

/// A raw nearest-neighbor match as returned by the vector store.
///
/// `distance` is cosine distance in `[0, 2]`, ascending (lower = closer).
#[derive(Debug, Clone)]
pub struct RawMatch {
    pub id: String,
    pub distance: f64,
    pub text: String,
    pub section: String,
    pub chunk_index: i64,
}

/// A retrieved chunk shaped for API responses.
///
/// `score` is `1 − distance` rounded to 4 decimal places; the rounding is
/// presentation only and never feeds back into ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub doc_id: String,
    pub score: f64,
    pub text: String,
}

/// Retrieval diagnostics entry returned by `POST /debug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugChunk {
    pub doc_id: String,
    pub section: String,
    pub chunk_index: i64,
    pub score: f64,
    /// First 200 characters of the chunk text.
    pub preview: String,
}

/// Response body for `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Source filenames, deduplicated, in first-seen ranking order.
    pub sources: Vec<String>,
    pub chunks: Vec<ChunkResult>,
}
