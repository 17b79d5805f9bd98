//! Configuration loading, validation, and management for Baso.
//!
//! Loads configuration from `~/.baso/config.toml` with environment variable
//! overrides. Validates all settings at startup; a missing credential is a
//! startup error, never a per-request branch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use baso_core::{LanguagePreference, ModelCatalog, PolicyRegistry};
use serde::{Deserialize, Serialize};

/// Transports `build_from_config` knows how to construct.
pub const KNOWN_TRANSPORTS: [&str; 2] = ["gemini", "openai_compat"];

/// The root configuration structure.
///
/// Maps directly to `~/.baso/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which transport to use ("gemini" or "openai_compat")
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Override the service base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model names per tier
    #[serde(default)]
    pub models: ModelConfig,

    /// Thinking-token budget for reasoning-heavy modes
    #[serde(default = "default_reasoning_budget")]
    pub reasoning_budget: u32,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the fragment channel between transport and controller
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Language preference locale ("min", "id", "en")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Overrides the localized apology shown on failed responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    /// Debounced autocomplete settings
    #[serde(default)]
    pub autocomplete: AutocompleteConfig,
}

fn default_transport() -> String {
    "gemini".into()
}
fn default_reasoning_budget() -> u32 {
    baso_core::mode::DEFAULT_REASONING_BUDGET
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_stream_buffer() -> usize {
    baso_core::transport::DEFAULT_FRAGMENT_BUFFER
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("transport", &self.transport)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("reasoning_budget", &self.reasoning_budget)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stream_buffer", &self.stream_buffer)
            .field("language", &self.language)
            .field("failure_message", &self.failure_message)
            .field("autocomplete", &self.autocomplete)
            .finish()
    }
}

/// Concrete model names for each tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_pro_model")]
    pub pro: String,

    #[serde(default = "default_flash_model")]
    pub flash: String,
}

fn default_pro_model() -> String {
    ModelCatalog::default().pro
}
fn default_flash_model() -> String {
    ModelCatalog::default().flash
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pro: default_pro_model(),
            flash: default_flash_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteConfig {
    /// Quiet window after the last keystroke before a completion is requested
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Inputs shorter than this (in characters) are not completed
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_quiet_window_ms() -> u64 {
    800
}
fn default_min_chars() -> usize {
    5
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: default_quiet_window_ms(),
            min_chars: default_min_chars(),
        }
    }
}

impl AutocompleteConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Also checks environment variables:
    /// - `BASO_API_KEY` (highest priority), `GEMINI_API_KEY`, `API_KEY`
    /// - `BASO_TRANSPORT`
    /// - `BASO_LANGUAGE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["BASO_API_KEY", "GEMINI_API_KEY", "API_KEY"]
                .into_iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
        }

        if let Some(transport) = lookup("BASO_TRANSPORT") {
            self.transport = transport;
        }

        if let Some(language) = lookup("BASO_LANGUAGE") {
            self.language = Some(language);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".baso")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_TRANSPORTS.contains(&self.transport.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown transport '{}', expected one of {:?}",
                self.transport, KNOWN_TRANSPORTS
            )));
        }

        if self.models.pro.trim().is_empty() || self.models.flash.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "models.pro and models.flash must not be empty".into(),
            ));
        }

        if self.stream_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "stream_buffer must be > 0".into(),
            ));
        }

        if self.autocomplete.quiet_window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "autocomplete.quiet_window_ms must be > 0".into(),
            ));
        }

        self.language_preference()?;
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// The API key, or a startup error if none is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// The parsed language preference, if one is configured.
    pub fn language_preference(&self) -> Result<Option<LanguagePreference>, ConfigError> {
        self.language
            .as_deref()
            .map(|l| {
                l.parse()
                    .map_err(|e: baso_core::Error| ConfigError::ValidationError(e.to_string()))
            })
            .transpose()
    }

    /// Model names as the core catalog.
    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog {
            pro: self.models.pro.clone(),
            flash: self.models.flash.clone(),
        }
    }

    /// The policy registry with this configuration's reasoning budget.
    pub fn policy_registry(&self) -> PolicyRegistry {
        PolicyRegistry::with_reasoning_budget(self.reasoning_budget)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            transport: default_transport(),
            base_url: None,
            models: ModelConfig::default(),
            reasoning_budget: default_reasoning_budget(),
            request_timeout_secs: default_request_timeout_secs(),
            stream_buffer: default_stream_buffer(),
            language: None,
            failure_message: None,
            autocomplete: AutocompleteConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key configured (set BASO_API_KEY or api_key in config.toml)")]
    MissingApiKey,
}
