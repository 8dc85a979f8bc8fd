//! Retrieval service: query the vector store and shape ranked results.

use std::time::Instant;

use crate::error::ServiceError;
use crate::models::{ChunkResult, DebugChunk, RawMatch};
use crate::store::VectorStore;

/// Round a similarity score to 4 decimal places for presentation.
///
/// Applied after ranking; the store's native order is never re-sorted by
/// the rounded value.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn score_of(m: &RawMatch) -> f64 {
    round4((1.0 - m.distance).clamp(0.0, 1.0))
}

async fn fetch_matches(
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
    request_id: &str,
) -> Result<Vec<RawMatch>, ServiceError> {
    let count = store
        .count()
        .await
        .map_err(|e| ServiceError::IndexUnavailable(format!("Vector store unavailable: {}", e)))?;

    if count == 0 {
        tracing::warn!(request_id, "retrieve_no_docs");
        return Err(ServiceError::IndexUnavailable(
            "No documents ingested yet. Run: docqa ingest".to_string(),
        ));
    }

    // Asking for more than exists silently returns fewer.
    let k = top_k.min(count);

    let started = Instant::now();
    let matches = store
        .query(query, k)
        .await
        .map_err(|e| ServiceError::IndexUnavailable(format!("Vector search failed: {}", e)))?;

    tracing::info!(
        request_id,
        query,
        num_results = matches.len(),
        top_score = matches.first().map(score_of),
        latency_ms = started.elapsed().as_millis() as u64,
        "retrieval_complete"
    );

    Ok(matches)
}

/// Return the top-k most similar chunks for a query, closest first.
pub async fn retrieve(
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
    request_id: &str,
) -> Result<Vec<ChunkResult>, ServiceError> {
    let matches = fetch_matches(store, query, top_k, request_id).await?;
    Ok(matches
        .into_iter()
        .map(|m| ChunkResult {
            score: score_of(&m),
            doc_id: m.id,
            text: m.text,
        })
        .collect())
}

/// Retrieval diagnostics: section, chunk index, score, and a text preview
/// per match.
pub async fn retrieve_debug(
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
    request_id: &str,
) -> Result<Vec<DebugChunk>, ServiceError> {
    let matches = fetch_matches(store, query, top_k, request_id).await?;
    Ok(matches
        .into_iter()
        .map(|m| DebugChunk {
            score: score_of(&m),
            preview: m.text.chars().take(200).collect(),
            doc_id: m.id,
            section: m.section,
            chunk_index: m.chunk_index,
        })
        .collect())
}
