//! OpenAI-compatible transport implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing a
//! streaming `/chat/completions`. The instruction becomes the system message,
//! an image becomes an `image_url` part carrying a data URL, and the
//! reasoning hint maps onto `reasoning_effort`.

use async_trait::async_trait;
use baso_core::error::TransportError;
use baso_core::message::Role;
use baso_core::prompt::{AssembledRequest, TurnShape};
use baso_core::transport::{DEFAULT_FRAGMENT_BUFFER, FragmentReceiver, Transport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sse::{self, SseStep, StreamError};

/// A transport for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: String,
    buffer: usize,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    /// Create a new OpenAI-compatible transport.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            buffer: DEFAULT_FRAGMENT_BUFFER,
            client: sse::build_client(timeout)?,
        })
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Convert an assembled request into the chat completions body.
    fn to_api_request(request: &AssembledRequest) -> ApiRequest {
        let mut messages = vec![ApiMessage {
            role: "system".into(),
            content: ApiContent::Text(request.instruction.clone()),
        }];

        if request.shape == TurnShape::MultiTurn {
            messages.extend(request.prior_turns.iter().map(|turn| ApiMessage {
                role: match turn.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: ApiContent::Text(turn.text.clone()),
            }));
        }

        let content = match &request.attachment {
            Some(attachment) => ApiContent::Parts(vec![
                ApiContentPart::ImageUrl {
                    image_url: ApiImageUrl {
                        url: attachment.to_data_url(),
                    },
                },
                ApiContentPart::Text {
                    text: request.current_input.clone(),
                },
            ]),
            None => ApiContent::Text(request.current_input.clone()),
        };
        messages.push(ApiMessage {
            role: "user".into(),
            content,
        });

        ApiRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            reasoning_effort: request.reasoning.map(|h| reasoning_effort(h.budget_tokens)),
        }
    }

    fn parse_chunk(data: &str) -> Result<SseStep, TransportError> {
        // "[DONE]" signals end of stream
        if data == "[DONE]" {
            return Ok(SseStep::Done);
        }

        let chunk: StreamResponse = serde_json::from_str(data).map_err(sse::decode_error)?;
        if let Some(error) = chunk.error {
            return Err(error.into());
        }

        let fragments = chunk
            .choices
            .into_iter()
            .take(1)
            .filter_map(|choice| choice.delta.content)
            .collect();
        Ok(SseStep::Fragments(fragments))
    }
}

/// Bucket a thinking budget into the coarse effort levels these APIs accept.
fn reasoning_effort(budget_tokens: u32) -> &'static str {
    match budget_tokens {
        0..=1024 => "low",
        1025..=4096 => "medium",
        _ => "high",
    }
}

#[async_trait]
impl Transport for OpenAiCompatTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: AssembledRequest) -> Result<FragmentReceiver, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::to_api_request(&request);

        debug!(
            transport = %self.name,
            mode = %request.mode,
            model = %request.model,
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(sse::send_error)?;

        let response = sse::check_status("openai_compat", response).await?;
        Ok(sse::spawn_pump(
            "openai_compat",
            response,
            self.buffer,
            Self::parse_chunk,
        ))
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(sse::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- API request types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize)]
struct ApiImageUrl {
    url: String,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
