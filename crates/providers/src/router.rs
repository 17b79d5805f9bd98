//! Transport selection from configuration.

use std::sync::Arc;

use baso_config::{AppConfig, ConfigError};
use baso_core::transport::Transport;
use tracing::info;

use crate::gemini::GeminiTransport;
use crate::openai_compat::OpenAiCompatTransport;

/// Build the configured transport.
///
/// A missing API key is reported here, once, rather than on every request.
/// Local OpenAI-compatible servers (Ollama) run without a key.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Transport>, ConfigError> {
    let timeout = config.request_timeout();
    let not_configured = |e: baso_core::TransportError| ConfigError::ValidationError(e.to_string());

    let transport: Arc<dyn Transport> = match config.transport.as_str() {
        "gemini" => {
            let api_key = config.require_api_key()?;
            let mut transport = GeminiTransport::new(api_key, timeout)
                .map_err(not_configured)?
                .with_buffer(config.stream_buffer);
            if let Some(base_url) = &config.base_url {
                transport = transport.with_base_url(base_url);
            }
            Arc::new(transport)
        }
        "openai_compat" => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(config.api_key.is_some()));
            let api_key = match config.require_api_key() {
                Ok(key) => key.to_string(),
                Err(_) if is_local(&base_url) => "ollama".to_string(),
                Err(e) => return Err(e),
            };
            Arc::new(
                OpenAiCompatTransport::new("openai_compat", base_url, api_key, timeout)
                    .map_err(not_configured)?
                    .with_buffer(config.stream_buffer),
            )
        }
        other => {
            return Err(ConfigError::ValidationError(format!(
                "unknown transport '{other}'"
            )));
        }
    };

    info!(transport = transport.name(), "Transport ready");
    Ok(transport)
}

/// OpenAI itself when a key is present, a local Ollama otherwise.
fn default_base_url(has_key: bool) -> String {
    if has_key {
        "https://api.openai.com/v1".into()
    } else {
        "http://localhost:11434/v1".into()
    }
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("://localhost") || base_url.contains("://127.0.0.1")
}
