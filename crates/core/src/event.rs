//! Session events: how the UI layer observes a conversation.
//!
//! Every state transition of a session controller publishes the full
//! conversation snapshot. Observers subscribe and render whatever arrives.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::message::{ConversationSnapshot, MessageId};

/// All observable session transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// User message and pending assistant placeholder appended
    Submitted {
        message_id: MessageId,
        snapshot: ConversationSnapshot,
    },

    /// A fragment was appended to the in-flight assistant message
    Fragment {
        message_id: MessageId,
        fragment: String,
        snapshot: ConversationSnapshot,
    },

    /// The assistant message finished successfully
    Completed {
        message_id: MessageId,
        snapshot: ConversationSnapshot,
    },

    /// The assistant message was replaced with the failure text
    Failed {
        message_id: MessageId,
        snapshot: ConversationSnapshot,
    },

    /// The conversation was cleared (mode switch or explicit reset)
    Reset { snapshot: ConversationSnapshot },

    /// The conversation's context tag changed
    ContextChanged { snapshot: ConversationSnapshot },

    /// The conversation's language preference changed
    LanguageChanged { snapshot: ConversationSnapshot },
}

impl SessionEvent {
    /// Event name, e.g. for SSE or log fields.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Fragment { .. } => "fragment",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Reset { .. } => "reset",
            Self::ContextChanged { .. } => "context_changed",
            Self::LanguageChanged { .. } => "language_changed",
        }
    }

    /// The conversation as it stood right after this transition.
    pub fn snapshot(&self) -> &ConversationSnapshot {
        match self {
            Self::Submitted { snapshot, .. }
            | Self::Fragment { snapshot, .. }
            | Self::Completed { snapshot, .. }
            | Self::Failed { snapshot, .. }
            | Self::Reset { snapshot }
            | Self::ContextChanged { snapshot }
            | Self::LanguageChanged { snapshot } => snapshot,
        }
    }
}

/// A broadcast-based event bus for session events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. A slow
/// subscriber that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and can resynchronise from the next snapshot.
pub struct EventBus {
    sender: broadcast::Sender<Arc<SessionEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
