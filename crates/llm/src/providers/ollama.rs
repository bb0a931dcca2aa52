//! Ollama generation provider.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md
//!
//! Streaming responses are newline-delimited JSON. Network chunks do not
//! align with lines, so fragments are reassembled by [`LineBuffer`] before
//! parsing.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use citerag_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const GENERATE_ENDPOINT: &str = "/api/generate";

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    options: OllamaOptions,
    stream: bool,
}

/// Sampling options nested under `options`.
#[derive(Debug, Serialize, Default)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format, for both whole responses and stream lines.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_duration: Option<u64>,
    #[serde(default)]
    load_duration: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaResponse {
    /// Ollama reports failures in the body as `{"error": "..."}`.
    fn check(self) -> AppResult<Self> {
        match self.error {
            Some(error) => Err(AppError::Llm(format!("Ollama error: {}", error))),
            None => Ok(self),
        }
    }

    fn usage(&self) -> LlmUsage {
        LlmUsage {
            eval_secs: self.eval_duration.map(ns_to_secs),
            prompt_eval_secs: self.prompt_eval_duration.map(ns_to_secs),
            load_secs: self.load_duration.map(ns_to_secs),
            ..LlmUsage::new(
                self.prompt_eval_count.unwrap_or(0),
                self.eval_count.unwrap_or(0),
            )
        }
    }

    fn into_chunk(self) -> LlmStreamChunk {
        let usage = self.done.then(|| self.usage());
        LlmStreamChunk {
            content: self.response,
            model: self.model,
            done: self.done,
            usage,
        }
    }
}

fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1e9
}

/// Ollama generation client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new Ollama client with a custom base URL and no timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests abort after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: trim_base_url(base_url.into()),
            client,
        })
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream,
        }
    }

    async fn post(&self, body: &OllamaRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, GENERATE_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Ollama");

        let body = self.to_ollama_request(request, false);
        let response = self.post(&body).await?;

        let ollama_response: OllamaResponse = response
            .json::<OllamaResponse>()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?
            .check()?;

        let usage = ollama_response.usage();
        tracing::info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Received completion from Ollama"
        );

        Ok(LlmResponse {
            content: ollama_response.response.trim().to_string(),
            model: ollama_response.model,
            usage,
            done: ollama_response.done,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!(model = %request.model, "Starting streaming request to Ollama");

        let body = self.to_ollama_request(request, true);
        let response = self.post(&body).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| AppError::Llm(format!("Stream error: {}", e)))
            })
            .boxed();

        Ok(decode_ndjson(bytes))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = AppResult<Vec<u8>>> + Send>>;

struct DecodeState {
    bytes: ByteStream,
    lines: LineBuffer,
    pending: VecDeque<AppResult<LlmStreamChunk>>,
    finished: bool,
}

/// Turn a byte stream of newline-delimited JSON into stream fragments.
fn decode_ndjson(bytes: ByteStream) -> LlmStream {
    let state = DecodeState {
        bytes,
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(&bytes) {
                        state.pending.push_back(parse_line(&line));
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.push_back(Err(e));
                }
                None => {
                    state.finished = true;
                    if let Some(line) = state.lines.finish() {
                        state.pending.push_back(parse_line(&line));
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

fn parse_line(line: &str) -> AppResult<LlmStreamChunk> {
    let response: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| AppError::Llm(format!("Failed to parse stream fragment: {}", e)))?;
    Ok(response.check()?.into_chunk())
}

/// Accumulates bytes and yields complete, non-blank lines.
///
/// Splitting happens on raw bytes so multi-byte characters cut across
/// network chunks are decoded only once the line is complete.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
