//! In-memory [`VectorStore`] implementation for tests.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`; the lock is never held
//! across an await. Text is embedded with a deterministic token-hash
//! vectorizer so nearest-neighbor results reflect token overlap without any
//! network dependency.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::RwLock;

use crate::models::{ChunkMetadata, RawMatch};

use super::{cosine_distance, VectorStore};

const EMBED_DIMS: usize = 128;

struct StoredRow {
    id: String,
    text: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

/// In-memory store used by unit and end-to-end tests.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<StoredRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Deterministic bag-of-tokens embedding: each lowercased token hashes
/// (FNV-1a) into one of `EMBED_DIMS` buckets. Stable across processes,
/// unlike `std`'s randomly keyed hasher.
fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIMS];
    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % EMBED_DIMS as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().unwrap().len())
    }

    async fn reset(&self) -> Result<()> {
        self.rows.write().unwrap().clear();
        Ok(())
    }

    async fn upsert(
        &self,
        ids: &[String],
        texts: &[String],
        metadata: &[ChunkMetadata],
    ) -> Result<()> {
        let mut rows = self.rows.write().unwrap();
        for ((id, text), meta) in ids.iter().zip(texts.iter()).zip(metadata.iter()) {
            rows.retain(|row| row.id != *id);
            rows.push(StoredRow {
                id: id.clone(),
                text: text.clone(),
                metadata: meta.clone(),
                vector: embed_text(text),
            });
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RawMatch>> {
        let query_vec = embed_text(text);
        let rows = self.rows.read().unwrap();

        let mut matches: Vec<RawMatch> = rows
            .iter()
            .map(|row| RawMatch {
                id: row.id.clone(),
                distance: cosine_distance(&query_vec, &row.vector),
                text: row.text.clone(),
                section: row.metadata.section.clone(),
                chunk_index: row.metadata.chunk_index,
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(k);

        Ok(matches)
    }
}
