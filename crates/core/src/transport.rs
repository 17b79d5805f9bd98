//! Transport trait: the boundary to the remote language-model service.
//!
//! A transport takes an [`AssembledRequest`] and hands back a finite stream
//! of text fragments. Whether the request went out as a multi-turn chat or a
//! single-turn call, with or without an image, is decided by the request's
//! [`TurnShape`](crate::prompt::TurnShape); callers see the same interface
//! either way.
//!
//! Implementations: Gemini (`streamGenerateContent`), OpenAI-compatible chat
//! completions.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::prompt::AssembledRequest;

/// Receiving end of a fragment stream.
///
/// Yields non-empty fragments in arrival order, then closes. An `Err` item
/// means the call failed mid-stream; nothing follows it. The stream is not
/// restartable: retrying means issuing a new call. Dropping the receiver
/// stops the producer.
pub type FragmentReceiver = mpsc::Receiver<Result<String, TransportError>>;

/// Sending end used by transport implementations.
pub type FragmentSender = mpsc::Sender<Result<String, TransportError>>;

/// Default capacity of a fragment channel.
pub const DEFAULT_FRAGMENT_BUFFER: usize = 64;

/// Create a bounded fragment channel.
pub fn fragment_channel(buffer: usize) -> (FragmentSender, FragmentReceiver) {
    mpsc::channel(buffer.max(1))
}

/// The core Transport trait.
///
/// The session controller calls `stream()` without knowing which service is
/// behind it, so tests substitute a scripted double.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A human-readable name for this transport (e.g., "gemini").
    fn name(&self) -> &str;

    /// Start a request and return its fragment stream.
    ///
    /// Errors returned here (rather than inside the stream) mean the call
    /// never started: network, authentication or quota failures.
    async fn stream(&self, request: AssembledRequest) -> Result<FragmentReceiver, TransportError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> Result<bool, TransportError> {
        Ok(true)
    }
}
