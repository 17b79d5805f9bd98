//! # Baso Core
//!
//! Domain types, traits, and error definitions for the Baso streaming
//! conversation engine. This crate performs no I/O of its own: it defines
//! the domain model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`mode`]: interaction modes and the fail-fast policy registry
//! - [`prompt`]: the pure prompt assembler
//! - [`transport`]: the trait remote model services are reached through
//! - [`message`]: messages, attachments and the mutable conversation record
//! - [`event`]: snapshots published to observers after every transition

pub mod error;
pub mod event;
pub mod message;
pub mod mode;
pub mod prompt;
pub mod templates;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, TransportError};
pub use event::{EventBus, SessionEvent};
pub use message::{
    Attachment, Conversation, ConversationId, ConversationSnapshot, Message, MessageId,
    MessageStatus, Role,
};
pub use mode::{Mode, ModePolicy, ModelCatalog, ModelTier, PolicyRegistry, ReasoningHint};
pub use prompt::{
    AssembledRequest, LanguagePreference, PriorTurn, PromptAssembler, PromptInput, TurnShape,
};
pub use transport::{FragmentReceiver, FragmentSender, Transport, fragment_channel};
