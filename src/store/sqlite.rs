//! SQLite-backed [`VectorStore`].
//!
//! Chunks and their embedding vectors live in a single table named after
//! the configured collection. Embeddings are computed through the injected
//! [`EmbeddingProvider`] at upsert and query time; similarity search is
//! brute-force cosine over the stored vectors, which is more than adequate
//! for a documentation-sized corpus.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::models::{ChunkMetadata, RawMatch};
use crate::retry::{call_with_retry, RetryPolicy};

use super::{blob_to_vec, cosine_distance, vec_to_blob, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    table: String,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl SqliteVectorStore {
    /// Open (or create) the store file and ensure the collection table
    /// exists.
    pub async fn open(
        path: &Path,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("Invalid collection name: '{}'", collection);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open vector store at {}", path.display()))?;

        let store = Self {
            pool,
            table: collection.to_string(),
            embedder,
            retry,
        };
        store.ensure_table().await?;

        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                filename TEXT NOT NULL,
                section TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = call_with_retry(&self.retry, || self.embedder.embed(texts))
            .await
            .with_context(|| "Embedding request failed")?;
        Ok(vectors)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn reset(&self) -> Result<()> {
        // DROP IF EXISTS swallows the missing-collection case on first run.
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await?;
        self.ensure_table().await
    }

    async fn upsert(
        &self,
        ids: &[String],
        texts: &[String],
        metadata: &[ChunkMetadata],
    ) -> Result<()> {
        if ids.len() != texts.len() || ids.len() != metadata.len() {
            bail!(
                "upsert batch length mismatch: {} ids, {} texts, {} metadata",
                ids.len(),
                texts.len(),
                metadata.len()
            );
        }
        if ids.is_empty() {
            return Ok(());
        }

        let vectors = self.embed_with_retry(texts).await?;

        let mut tx = self.pool.begin().await?;
        for ((id, text), (meta, vector)) in ids
            .iter()
            .zip(texts.iter())
            .zip(metadata.iter().zip(vectors.iter()))
        {
            sqlx::query(&format!(
                "INSERT OR REPLACE INTO {} (id, text, source, filename, section, chunk_index, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                self.table
            ))
            .bind(id)
            .bind(text)
            .bind(&meta.source)
            .bind(&meta.filename)
            .bind(&meta.section)
            .bind(meta.chunk_index)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RawMatch>> {
        let query_vec = self
            .embed_with_retry(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let rows = sqlx::query(&format!(
            "SELECT id, text, section, chunk_index, embedding FROM {}",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<RawMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                RawMatch {
                    id: row.get("id"),
                    distance: cosine_distance(&query_vec, &vector),
                    text: row.get("text"),
                    section: row.get("section"),
                    chunk_index: row.get("chunk_index"),
                }
            })
            .collect();

        // Ascending distance; id tiebreak keeps ordering deterministic.
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
