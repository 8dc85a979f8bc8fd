//! # docqa
//!
//! A retrieval-augmented documentation assistant: markdown corpora are
//! chunked, embedded, and indexed in a vector store; natural-language
//! queries are answered by retrieving the most relevant chunks and
//! grounding an LLM completion in them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Corpus   │──▶│   Chunker     │──▶│ Vector store  │
//! │ (markdown) │   │ (md-aware)   │   │ (embeddings) │
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │
//!                    ┌───────────────────────┤
//!                    ▼                       ▼
//!              ┌───────────┐          ┌────────────┐
//!              │ Retrieval │─────────▶│ Generation │
//!              │  service  │          │orchestrator│
//!              └───────────┘          └─────┬──────┘
//!                                           ▼
//!                                 HTTP / SSE (axum)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa ingest                  # chunk + embed + index the corpus
//! docqa serve                   # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types |
//! | [`chunk`] | Markdown-aware chunking |
//! | [`corpus`] | Corpus enumeration |
//! | [`ingest`] | Full-replace re-ingestion pipeline |
//! | [`store`] | Vector store trait and backends |
//! | [`embedding`] | Embedding provider |
//! | [`llm`] | Completion model (buffered and streaming) |
//! | [`retrieval`] | Top-k retrieval and result shaping |
//! | [`answer`] | Grounding prompt, retries, stream state machine |
//! | [`retry`] | Backoff policy for transient provider errors |
//! | [`ratelimit`] | Per-client, per-route admission |
//! | [`feedback`] | Answer rating store |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod ratelimit;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod store;
