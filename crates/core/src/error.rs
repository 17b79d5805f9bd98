//! Error types for the Baso domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Transport failures live in their own enum so adapters can be `Clone`
//! and cross task boundaries inside a fragment channel.

use thiserror::Error;

use crate::mode::Mode;

/// The top-level error type for all Baso operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors (fail at startup) ---
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Submission errors (rejected synchronously, no state change) ---
    #[error("Input is empty and no attachment was provided")]
    EmptyInput,

    #[error("Mode '{0}' does not accept image attachments")]
    AttachmentNotSupported(Mode),

    // --- Transport errors (recovered into a failed message) ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("The model returned an empty response")]
    EmptyResponse,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a transport adapter.
///
/// The controller does not distinguish between these; they only matter for
/// logs and diagnostics.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Quota exhausted or rate limited, retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}
