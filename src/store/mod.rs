//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the black-box boundary the query and
//! ingestion pipelines depend on: text goes in via [`upsert`](VectorStore::upsert),
//! ranked matches come back via [`query`](VectorStore::query). Embedding
//! happens behind the boundary, so callers never handle vectors.
//!
//! Implementations must be `Send + Sync`; they are shared as long-lived
//! handles across all in-flight requests.
//!
//! Also provides the vector utilities shared by backends:
//! [`cosine_similarity`], plus [`vec_to_blob`] / [`blob_to_vec`] for
//! encoding `f32` vectors as little-endian SQLite BLOBs.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkMetadata, RawMatch};

/// Abstract vector store for one chunk collection.
///
/// `query` returns matches ordered by ascending cosine distance (in
/// `[0, 2]`); callers must preserve that order. `reset` performs the full
/// collection replace used by re-ingestion and is idempotent when the
/// collection does not yet exist. Concurrent `reset` runs are not
/// supported — callers serialize ingestion.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of chunks currently in the collection.
    async fn count(&self) -> Result<usize>;

    /// Delete the collection if it exists and recreate it empty.
    async fn reset(&self) -> Result<()>;

    /// Insert or replace a batch of chunks. The three slices are parallel.
    async fn upsert(
        &self,
        ids: &[String],
        texts: &[String],
        metadata: &[ChunkMetadata],
    ) -> Result<()>;

    /// Return the `k` nearest chunks to `text`, closest first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RawMatch>>;
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance in `[0, 2]` — the ranking metric stores report.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_gives_max_distance() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
