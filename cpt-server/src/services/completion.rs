//! Completion service client
//!
//! The narrative endpoints talk to a [`CompletionService`]. The production
//! implementation calls an OpenAI-compatible chat-completions API; tests
//! substitute a scripted fake.

use async_trait::async_trait;
use cpt_common::config::CompletionConfig;
use cpt_common::{Error, Result};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Finite sequence of text fragments from a streamed completion
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// System and user messages sent to the completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a full completion
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Request a streamed completion
    ///
    /// Errors returned here happen before any fragment was produced; errors
    /// inside the stream happen mid-response.
    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatContent>,
    delta: Option<ChatContent>,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Chat-completions client
pub struct OpenAiCompletionClient {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        // No overall timeout on the client: streamed responses outlive it.
        // One-shot requests set their own.
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            warn!("No completion API key configured; narrative requests will fail");
        }

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    async fn send(&self, prompt: &Prompt, stream: bool) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Upstream("No completion API key configured".to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        };

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body);
        if !stream {
            request = request.timeout(self.timeout);
        }

        debug!(model = %self.model, stream, "Sending completion request");
        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(300).collect();
            return Err(Error::Upstream(format!(
                "Completion service returned {}: {}",
                status, excerpt
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let response = self.send(prompt, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Malformed completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| Error::Upstream("Completion response has no content".to_string()))
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let response = self.send(prompt, true).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let fragments = async_stream::stream! {
            let mut decoder = EventStreamDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(Error::Upstream(format!("Completion stream interrupted: {}", e)));
                        return;
                    }
                };
                match decoder.push(&chunk) {
                    Ok(decoded) => {
                        for fragment in decoded {
                            yield Ok(fragment);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
                if decoder.is_done() {
                    break;
                }
            }
        };

        Ok(Box::pin(fragments))
    }
}

/// Incremental decoder for the `data:` lines of a streamed completion
///
/// Bytes may split lines (and UTF-8 sequences) anywhere, so only complete
/// lines are decoded.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl EventStreamDecoder {
    /// Feed raw bytes; returns the text fragments completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
            if let Some(fragment) = self.decode_line(line)? {
                fragments.push(fragment);
            }
        }

        Ok(fragments)
    }

    /// True once the `[DONE]` sentinel was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<String>> {
        let Some(payload) = line.strip_prefix("data:") else {
            // Comments, event names and blank separators carry no text
            return Ok(None);
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }
        if payload.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| Error::Upstream(format!("Malformed stream chunk: {}", e)))?;
        if let Some(error) = value.get("error") {
            return Err(Error::Upstream(format!("Completion stream error: {}", error)));
        }

        let chunk: ChatResponse = serde_json::from_value(value)
            .map_err(|e| Error::Upstream(format!("Malformed stream chunk: {}", e)))?;
        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty()))
    }
}
