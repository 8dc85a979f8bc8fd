//! Generation orchestrator: retrieval → grounding prompt → completion.
//!
//! The buffered path ([`answer`]) returns a full [`QueryResponse`]; the
//! streaming path ([`answer_stream`]) drives an explicit event sequence
//! over a channel: `metadata` → zero or more `token`s → exactly one
//! terminal `done` or `error`. Once metadata has been flushed the HTTP
//! status is committed, so every later failure is reported as an in-band
//! `error` event — never an exception across the transport boundary.
//!
//! Transient provider failures are retried when *initiating* a completion
//! (buffered call or stream opening). A stream that has begun delivering
//! tokens cannot be replayed and is never retried.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ServiceError;
use crate::llm::CompletionModel;
use crate::models::{ChunkResult, QueryResponse};
use crate::retrieval::retrieve;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::store::VectorStore;

/// Separator between context entries in the grounding prompt.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Long-lived dependencies shared across all requests.
pub struct AnswerDeps {
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn CompletionModel>,
    pub retry: RetryPolicy,
}

/// Build the system prompt that constrains the model to the supplied
/// context.
fn build_system_prompt(context: &str) -> String {
    format!(
        "You are an internal documentation assistant. Answer the user's question using ONLY \
         the provided context below. Do not use any prior knowledge.\n\n\
         If the context does not contain enough information to answer the question, respond \
         with: \"I don't know based on the available documentation.\"\n\n\
         Be concise and direct. Cite the source document when possible.\n\n\
         Context:\n{}",
        context
    )
}

/// Source filename portion of a chunk ID (the text before `"::"`).
fn source_of(doc_id: &str) -> &str {
    doc_id.split("::").next().unwrap_or(doc_id)
}

/// Assemble the grounding context and the deduplicated source list.
///
/// Sources keep first-seen order, which by construction is the match
/// ranking order.
fn build_context(chunks: &[ChunkResult]) -> (String, Vec<String>) {
    let mut parts = Vec::with_capacity(chunks.len());
    let mut sources: Vec<String> = Vec::new();

    for chunk in chunks {
        let source = source_of(&chunk.doc_id);
        parts.push(format!("[Source: {}]\n{}", source, chunk.text));
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }

    (parts.join(CONTEXT_SEPARATOR), sources)
}

/// Retrieve relevant chunks and generate a grounded answer.
pub async fn answer(
    deps: &AnswerDeps,
    query: &str,
    top_k: usize,
    request_id: &str,
) -> Result<QueryResponse, ServiceError> {
    let chunks = retrieve(deps.store.as_ref(), query, top_k, request_id).await?;
    let (context, sources) = build_context(&chunks);
    let system = build_system_prompt(&context);

    let started = Instant::now();
    let answer = call_with_retry(&deps.retry, || deps.llm.complete(&system, query))
        .await
        .map_err(|err| {
            tracing::error!(request_id, error = %err, "llm_error");
            ServiceError::Provider(err)
        })?;

    tracing::info!(
        request_id,
        model = deps.llm.model_name(),
        latency_ms = started.elapsed().as_millis() as u64,
        num_sources = sources.len(),
        "llm_complete"
    );

    Ok(QueryResponse {
        answer,
        sources,
        chunks,
    })
}

/// One event in the `/query/stream` SSE sequence.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Metadata {
        sources: Vec<String>,
        chunks: Vec<ChunkResult>,
    },
    Token {
        text: String,
    },
    Done,
    Error {
        detail: String,
    },
}

impl StreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Metadata { .. } => "metadata",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// SSE data payload as single-line JSON.
    pub fn data_json(&self) -> String {
        match self {
            StreamEvent::Metadata { sources, chunks } => {
                serde_json::json!({ "sources": sources, "chunks": chunks }).to_string()
            }
            StreamEvent::Token { text } => serde_json::json!({ "text": text }).to_string(),
            StreamEvent::Done => "{}".to_string(),
            StreamEvent::Error { detail } => {
                serde_json::json!({ "detail": detail }).to_string()
            }
        }
    }
}

/// Start the streaming answer pipeline for one request.
///
/// The returned stream ends after the single terminal event. Dropping it
/// (client disconnect) closes the channel; the generation task notices on
/// its next send and stops consuming the provider stream.
pub fn answer_stream(
    deps: Arc<AnswerDeps>,
    query: String,
    top_k: usize,
    request_id: String,
) -> ReceiverStream<StreamEvent> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        run_stream(deps, query, top_k, request_id, tx).await;
    });
    ReceiverStream::new(rx)
}

async fn run_stream(
    deps: Arc<AnswerDeps>,
    query: String,
    top_k: usize,
    request_id: String,
    tx: mpsc::Sender<StreamEvent>,
) {
    // Retrieval phase. Failures here (empty collection included) occur
    // before metadata is emitted, so the error event is the only output.
    let chunks = match retrieve(deps.store.as_ref(), &query, top_k, &request_id).await {
        Ok(chunks) => chunks,
        Err(err) => {
            tracing::error!(request_id, error = %err, "stream_retrieval_error");
            let detail = match err {
                ServiceError::IndexUnavailable(detail) => detail,
                other => other.to_string(),
            };
            let _ = tx.send(StreamEvent::Error { detail }).await;
            return;
        }
    };

    let (context, sources) = build_context(&chunks);
    if tx
        .send(StreamEvent::Metadata { sources, chunks })
        .await
        .is_err()
    {
        return;
    }

    let system = build_system_prompt(&context);
    let started = Instant::now();

    let mut tokens =
        match call_with_retry(&deps.retry, || deps.llm.complete_stream(&system, &query)).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(request_id, error = %err, "stream_llm_error");
                let _ = tx
                    .send(StreamEvent::Error {
                        detail: format!("LLM request failed: {}", err),
                    })
                    .await;
                return;
            }
        };

    while let Some(item) = tokens.next().await {
        match item {
            Ok(text) => {
                if text.is_empty() {
                    continue;
                }
                if tx.send(StreamEvent::Token { text }).await.is_err() {
                    // Client went away; release the provider stream.
                    return;
                }
            }
            Err(err) => {
                tracing::error!(request_id, error = %err, "stream_llm_error");
                let _ = tx
                    .send(StreamEvent::Error {
                        detail: format!("LLM request failed: {}", err),
                    })
                    .await;
                return;
            }
        }
    }

    tracing::info!(
        request_id,
        model = deps.llm.model_name(),
        latency_ms = started.elapsed().as_millis() as u64,
        "stream_llm_complete"
    );
    let _ = tx.send(StreamEvent::Done).await;
}
