//! Ingestion pipeline: corpus → chunker → vector store.
//!
//! Re-ingestion is a full collection replace: the existing collection is
//! dropped and every document's chunks are upserted in batches. The result
//! is deterministic — chunk IDs are derived from sorted relative paths and
//! chunk indices, so re-ingesting an unchanged corpus yields the same IDs.
//!
//! The replace is not atomic against concurrent readers: a request served
//! mid-ingest may observe an empty or partially populated collection.
//! Ingestion runs must not overlap; callers serialize them.

use anyhow::Result;
use std::sync::Arc;

use crate::chunk::chunk_markdown;
use crate::config::Config;
use crate::corpus;
use crate::embedding::OpenAiEmbeddings;
use crate::models::{ChunkMetadata, Document};
use crate::retry::RetryPolicy;
use crate::store::sqlite::SqliteVectorStore;
use crate::store::VectorStore;

/// Chunks per upsert call, sized to respect typical store payload limits.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Stable chunk ID: `"{relative_path}::chunk{index}"`.
///
/// The portion before `"::"` recovers the source document during answer
/// attribution.
pub fn chunk_id(relative_path: &str, index: usize) -> String {
    format!("{}::chunk{}", relative_path, index)
}

/// Replace the collection with the chunked contents of `documents`.
///
/// Returns the number of chunks written.
pub async fn reingest(
    store: &dyn VectorStore,
    documents: &[Document],
    max_chars: usize,
) -> Result<usize> {
    let mut ids = Vec::new();
    let mut texts = Vec::new();
    let mut metadata = Vec::new();

    for doc in documents {
        let chunks = chunk_markdown(&doc.content, max_chars);
        tracing::info!(
            source = %doc.relative_path,
            chunks = chunks.len(),
            "document_chunked"
        );
        for (i, chunk) in chunks.into_iter().enumerate() {
            ids.push(chunk_id(&doc.relative_path, i));
            metadata.push(ChunkMetadata {
                source: doc.relative_path.clone(),
                filename: doc.filename.clone(),
                section: chunk.section,
                chunk_index: i as i64,
            });
            texts.push(chunk.text);
        }
    }

    store.reset().await?;

    for start in (0..ids.len()).step_by(UPSERT_BATCH_SIZE) {
        let end = (start + UPSERT_BATCH_SIZE).min(ids.len());
        store
            .upsert(&ids[start..end], &texts[start..end], &metadata[start..end])
            .await?;
    }

    Ok(ids.len())
}

/// Entry point for the `docqa ingest` command.
pub async fn run_ingest(config: &Config) -> Result<()> {
    let documents = corpus::load_markdown_files(&config.corpus)?;
    println!("Found {} markdown file(s)", documents.len());

    let api_key = config.require_api_key()?;
    let embedder = Arc::new(OpenAiEmbeddings::new(&config.provider, api_key)?);
    let store = SqliteVectorStore::open(
        &config.store.path,
        &config.store.collection,
        embedder,
        RetryPolicy::from_config(&config.retry),
    )
    .await?;

    let total = reingest(&store, &documents, config.chunking.max_chars).await?;
    println!(
        "Ingested {} chunks into {}",
        total,
        config.store.path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn sample_docs() -> Vec<Document> {
        vec![
            Document {
                filename: "alpha.md".to_string(),
                relative_path: "alpha.md".to_string(),
                content: "# Alpha\n\n## Setup\n\nInstall the toolchain.\n\n## Usage\n\nRun it."
                    .to_string(),
            },
            Document {
                filename: "beta.md".to_string(),
                relative_path: "guides/beta.md".to_string(),
                content: "Just an intro paragraph.".to_string(),
            },
        ]
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("guides/beta.md", 2), "guides/beta.md::chunk2");
        let id = chunk_id("guides/beta.md", 2);
        assert_eq!(id.split("::").next().unwrap(), "guides/beta.md");
    }

    #[tokio::test]
    async fn test_reingest_writes_all_chunks() {
        let store = InMemoryStore::new();
        let count = reingest(&store, &sample_docs(), 1500).await.unwrap();
        // alpha.md: (intro) + Setup + Usage; beta.md: (intro)
        assert_eq!(count, 4);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let store = InMemoryStore::new();
        let first = reingest(&store, &sample_docs(), 1500).await.unwrap();
        let second = reingest(&store, &sample_docs(), 1500).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count().await.unwrap(), first);

        // IDs are stable: the same query returns the same chunk IDs.
        let matches = store.query("Install the toolchain", 4).await.unwrap();
        assert!(matches.iter().any(|m| m.id == "alpha.md::chunk1"));
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_collection() {
        let store = InMemoryStore::new();
        reingest(&store, &sample_docs(), 1500).await.unwrap();

        let smaller = vec![sample_docs().remove(1)];
        let count = reingest(&store, &smaller, 1500).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
