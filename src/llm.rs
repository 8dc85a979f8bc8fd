//! Completion model abstraction.
//!
//! The [`CompletionModel`] trait covers both buffered and streaming chat
//! completions. The OpenAI implementation talks to `POST /chat/completions`
//! over `reqwest`; streamed responses are parsed incrementally from SSE
//! `data:` lines, tolerating fragments that split lines across network
//! chunks.
//!
//! Like the embedding provider, each call is a single attempt with a fixed
//! timeout; retry decisions belong to [`crate::retry`]. A stream that has
//! started yielding tokens is never retried.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Content fragments from a streamed completion, in provider arrival order.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

/// A chat completion model, buffered or streaming.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Run a completion and return the full answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;

    /// Open a streaming completion. The returned stream yields non-empty
    /// content fragments; stream end is the natural end of the sequence.
    async fn complete_stream(&self, system: &str, user: &str)
        -> Result<TokenStream, ProviderError>;

    /// Model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
}

/// Completion model backed by the OpenAI chat completions API.
pub struct OpenAiCompletions {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletions {
    pub fn new(config: &ProviderConfig, api_key: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.completion_model.clone(),
        })
    }

    async fn send_request(
        &self,
        system: &str,
        user: &str,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.1,
            stream,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body_text));
        }

        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionModel for OpenAiCompletions {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let response = self.send_request(system, user, false).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::other(format!("invalid completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::other("completion response has no content"))
    }

    async fn complete_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<TokenStream, ProviderError> {
        let response = self.send_request(system, user, true).await?;

        let state = SseParseState {
            inner: response.bytes_stream().boxed(),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(token) = state.pending.pop_front() {
                    return Some((Ok(token), state));
                }
                if state.done {
                    return None;
                }
                match state.inner.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                        state.drain_complete_lines();
                    }
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(ProviderError::from_reqwest(err)), state));
                    }
                    None => return None,
                }
            }
        });

        Ok(stream.boxed())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

struct SseParseState {
    inner: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

impl SseParseState {
    /// Consume complete `data:` lines from the buffer, queueing any content
    /// fragments they carry. `[DONE]` ends the stream; fragments with empty
    /// or absent content are end-of-message sentinels, not tokens.
    fn drain_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                self.done = true;
                return;
            }
            if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
                if let Some(content) = chunk.choices.first().and_then(|c| c.delta.content.clone())
                {
                    if !content.is_empty() {
                        self.pending.push_back(content);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_state() -> SseParseState {
        SseParseState {
            inner: futures_util::stream::empty().boxed(),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    #[test]
    fn test_drain_extracts_content_tokens() {
        let mut state = parse_state();
        state.buffer.push_str(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        );
        state.drain_complete_lines();
        assert_eq!(state.pending, VecDeque::from(["Hel".to_string(), "lo".to_string()]));
        assert!(!state.done);
    }

    #[test]
    fn test_drain_skips_empty_delta_sentinel() {
        let mut state = parse_state();
        state
            .buffer
            .push_str("data: {\"choices\":[{\"delta\":{}}]}\n\ndata: [DONE]\n\n");
        state.drain_complete_lines();
        assert!(state.pending.is_empty());
        assert!(state.done);
    }

    #[test]
    fn test_drain_holds_partial_lines() {
        let mut state = parse_state();
        state.buffer.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\ndata: {\"choi");
        state.drain_complete_lines();
        assert_eq!(state.pending, VecDeque::from(["Hi".to_string()]));
        // The incomplete line stays buffered for the next network chunk.
        assert_eq!(state.buffer, "data: {\"choi");
    }
}
