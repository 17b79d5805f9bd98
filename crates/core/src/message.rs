//! Message and Conversation domain types.
//!
//! A conversation is the mutable record the UI layer renders: user turns are
//! immutable once appended, and at most one assistant turn is in flight,
//! growing fragment by fragment until it completes or fails.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mode::Mode;
use crate::prompt::LanguagePreference;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single message: creation time in unix millis plus a
/// per-conversation sequence number, so two ids minted in the same
/// millisecond still differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    fn mint(seq: u64) -> Self {
        Self(format!("{}-{}", Utc::now().timestamp_millis(), seq))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Assistant,
}

/// Lifecycle of a message.
///
/// User messages are created `Complete`. Assistant messages go
/// `Pending` → `Streaming` (first fragment) → `Complete` | `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Failed,
}

impl MessageStatus {
    /// Whether the message is still waiting on the transport.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Streaming)
    }
}

/// An inline image attached to a user message.
///
/// The payload is kept base64-encoded: that is the form both the UI layer and
/// the remote service exchange, and it keeps snapshots cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/png`
    pub media_type: String,

    /// Base64 (standard alphabet) encoded bytes
    pub data: String,
}

impl Attachment {
    /// Wrap raw image bytes.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Read an image file, inferring the media type from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let media_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(media_type_for_extension)
            .ok_or_else(|| {
                Error::Internal(format!("unsupported image type: {}", path.display()))
            })?;
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Internal(format!("failed to read {}: {e}", path.display())))?;
        Ok(Self::from_bytes(media_type, &bytes))
    }

    /// Render as a `data:` URL (used by OpenAI-style `image_url` parts).
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID, stable for the message's lifetime
    pub id: MessageId,

    /// Who sent this message
    pub role: Role,

    /// The text content; grows while an assistant message streams
    pub content: String,

    /// Inline image, only ever present on user messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    /// Lifecycle status
    pub status: MessageStatus,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// A conversation: ordered messages (insertion order is display order)
/// plus the qualifiers that shape the next request.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: ConversationId,
    mode: Mode,
    context_tag: Option<String>,
    language: Option<LanguagePreference>,
    messages: Vec<Message>,
    next_seq: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation for a mode.
    pub fn new(mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            mode,
            context_tag: None,
            language: None,
            messages: Vec::new(),
            next_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn context_tag(&self) -> Option<&str> {
        self.context_tag.as_deref()
    }

    pub fn language(&self) -> Option<LanguagePreference> {
        self.language
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record the conversation's context tag. Only the first call takes
    /// effect; returns `false` if a tag was already set.
    pub fn set_context_tag(&mut self, tag: impl Into<String>) -> bool {
        if self.context_tag.is_some() {
            return false;
        }
        self.context_tag = Some(tag.into());
        self.touch();
        true
    }

    pub fn set_language(&mut self, language: Option<LanguagePreference>) {
        self.language = language;
        self.touch();
    }

    /// Drop every message and start over in `mode`. The language preference
    /// survives; the context tag does not.
    pub fn reset(&mut self, mode: Mode) {
        let language = self.language;
        *self = Self::new(mode);
        self.language = language;
    }

    /// The assistant message currently in flight, if any.
    pub fn pending(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.status.is_in_flight())
    }

    pub fn pending_id(&self) -> Option<&MessageId> {
        self.pending().map(|m| &m.id)
    }

    /// Append a complete user message and a pending assistant placeholder.
    ///
    /// Returns the id of the placeholder. Fails if another assistant message
    /// is already in flight.
    pub fn begin_turn(
        &mut self,
        input: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<MessageId> {
        if let Some(pending) = self.pending_id() {
            return Err(Error::Internal(format!(
                "message {pending} is still in flight"
            )));
        }

        let user = self.mint(Role::User, input.into(), attachment, MessageStatus::Complete);
        self.messages.push(user);

        let assistant = self.mint(Role::Assistant, String::new(), None, MessageStatus::Pending);
        let id = assistant.id.clone();
        self.messages.push(assistant);
        self.touch();
        Ok(id)
    }

    /// Append a fragment to the in-flight assistant message `target`.
    ///
    /// Returns `false` (and changes nothing) when `target` is no longer the
    /// in-flight message, e.g. after a mode switch.
    pub fn append_fragment(&mut self, target: &MessageId, fragment: &str) -> bool {
        let Some(message) = self.in_flight_mut(target) else {
            return false;
        };
        message.status = MessageStatus::Streaming;
        message.content.push_str(fragment);
        self.touch();
        true
    }

    /// Mark `target` complete. Returns `false` if it is not in flight.
    pub fn complete(&mut self, target: &MessageId) -> bool {
        let Some(message) = self.in_flight_mut(target) else {
            return false;
        };
        message.status = MessageStatus::Complete;
        self.touch();
        true
    }

    /// Replace the content of `target` with `failure_text` and mark it
    /// failed. Partial content is discarded. Returns `false` if `target` is
    /// not in flight.
    pub fn fail(&mut self, target: &MessageId, failure_text: &str) -> bool {
        let Some(message) = self.in_flight_mut(target) else {
            return false;
        };
        message.content = failure_text.to_string();
        message.status = MessageStatus::Failed;
        self.touch();
        true
    }

    /// Read-only copy for observers.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation_id: self.id.clone(),
            mode: self.mode,
            context_tag: self.context_tag.clone(),
            language: self.language,
            messages: self.messages.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn in_flight_mut(&mut self, target: &MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| &m.id == target && m.status.is_in_flight())
    }

    fn mint(
        &mut self,
        role: Role,
        content: String,
        attachment: Option<Attachment>,
        status: MessageStatus,
    ) -> Message {
        self.next_seq += 1;
        Message {
            id: MessageId::mint(self.next_seq),
            role,
            content,
            attachment,
            status,
            timestamp: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Immutable view of a conversation published to observers after every
/// state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub conversation_id: ConversationId,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguagePreference>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSnapshot {
    /// The most recent message, usually the assistant turn being rendered.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn find(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }
}
