//! Transport implementations for Baso.
//!
//! All transports implement the `baso_core::Transport` trait.
//! The router builds the configured one at startup.

pub mod gemini;
pub mod openai_compat;
pub mod router;
pub mod sse;

pub use gemini::GeminiTransport;
pub use openai_compat::OpenAiCompatTransport;
pub use router::build_from_config;
