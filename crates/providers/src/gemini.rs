//! Gemini transport (`streamGenerateContent` over SSE).
//!
//! Multi-turn requests send prior turns as `contents` with roles `user` and
//! `model`; single-turn requests send only the current input. The instruction
//! goes in `systemInstruction`, an image as an `inlineData` part ahead of the
//! text, and the reasoning hint as `thinkingConfig.thinkingBudget`.

use async_trait::async_trait;
use baso_core::error::TransportError;
use baso_core::message::Role;
use baso_core::prompt::{AssembledRequest, TurnShape};
use baso_core::transport::{DEFAULT_FRAGMENT_BUFFER, FragmentReceiver, Transport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sse::{self, SseStep, StreamError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Streams completions from the Gemini API.
pub struct GeminiTransport {
    base_url: String,
    api_key: String,
    buffer: usize,
    client: reqwest::Client,
}

impl GeminiTransport {
    pub fn new(
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            buffer: DEFAULT_FRAGMENT_BUFFER,
            client: sse::build_client(timeout)?,
        })
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Convert an assembled request into the API body.
    fn to_api_request(request: &AssembledRequest) -> ApiRequest {
        let mut contents = Vec::new();

        if request.shape == TurnShape::MultiTurn {
            contents.extend(request.prior_turns.iter().map(|turn| ApiContent {
                role: api_role(turn.role).into(),
                parts: vec![ApiPart::text(&turn.text)],
            }));
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(attachment) = &request.attachment {
            parts.push(ApiPart {
                inline_data: Some(ApiInlineData {
                    mime_type: attachment.media_type.clone(),
                    data: attachment.data.clone(),
                }),
                ..ApiPart::default()
            });
        }
        // An image-only turn carries no text part
        if !request.current_input.trim().is_empty() {
            parts.push(ApiPart::text(&request.current_input));
        }
        contents.push(ApiContent {
            role: "user".into(),
            parts,
        });

        ApiRequest {
            contents,
            system_instruction: Some(ApiSystemInstruction {
                parts: vec![ApiPart::text(&request.instruction)],
            }),
            generation_config: request.reasoning.map(|hint| ApiGenerationConfig {
                thinking_config: ApiThinkingConfig {
                    thinking_budget: hint.budget_tokens,
                },
            }),
        }
    }

    /// Extract visible text from one streamed chunk.
    fn parse_chunk(data: &str) -> Result<SseStep, TransportError> {
        let chunk: StreamResponse = serde_json::from_str(data).map_err(sse::decode_error)?;
        if let Some(error) = chunk.error {
            return Err(error.into());
        }

        let fragments = chunk
            .candidates
            .into_iter()
            .take(1)
            .filter_map(|c| c.content)
            .flat_map(|content| content.parts)
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();
        Ok(SseStep::Fragments(fragments))
    }
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, request: AssembledRequest) -> Result<FragmentReceiver, TransportError> {
        let body = Self::to_api_request(&request);

        debug!(
            mode = %request.mode,
            model = %request.model,
            prior_turns = request.prior_turns.len(),
            image = request.attachment.is_some(),
            "Sending Gemini streaming request"
        );

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(sse::send_error)?;

        let response = sse::check_status("gemini", response).await?;
        Ok(sse::spawn_pump(
            "gemini",
            response,
            self.buffer,
            Self::parse_chunk,
        ))
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(sse::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

impl ApiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    thinking_config: ApiThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiThinkingConfig {
    thinking_budget: u32,
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamCandidate {
    #[serde(default)]
    content: Option<StreamContent>,
}

#[derive(Debug, Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Debug, Deserialize)]
struct StreamPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}
