//! The streaming session controller.
//!
//! One controller owns one conversation. A submission moves it
//! `Idle → Dispatching → Streaming → Idle`; every transition publishes the
//! full conversation snapshot on the event bus.
//!
//! The controller is a cheap cloneable handle. State lives behind a mutex
//! that is only held for synchronous bookkeeping, never across an await, so
//! a UI can call `switch_mode` or `snapshot` while a submission is streaming.

use std::sync::{Arc, Mutex, MutexGuard};

use baso_config::AppConfig;
use baso_core::error::{Error, Result, TransportError};
use baso_core::event::{EventBus, SessionEvent};
use baso_core::message::{Attachment, Conversation, ConversationSnapshot, MessageId};
use baso_core::mode::Mode;
use baso_core::prompt::{LanguagePreference, PromptAssembler, PromptInput};
use baso_core::transport::Transport;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Where a controller is in its submission cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for the next submission
    Idle,
    /// Request sent, no fragment received yet
    Dispatching,
    /// At least one fragment applied
    Streaming,
}

/// How a `submit` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The assistant message holds the full response
    Completed(MessageId),
    /// The assistant message was replaced with the apology
    Failed(MessageId),
    /// The conversation was reset or switched while the response was in
    /// flight; the rest of the stream was dropped
    Abandoned(MessageId),
    /// Another submission is in flight; nothing changed
    Busy,
}

impl SubmitOutcome {
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Completed(id) | Self::Failed(id) | Self::Abandoned(id) => Some(id),
            Self::Busy => None,
        }
    }
}

struct Inner {
    conversation: Conversation,
    state: SessionState,
}

/// Drives one conversation against a transport.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    assembler: Arc<PromptAssembler>,
    transport: Arc<dyn Transport>,
    events: Arc<EventBus>,
    failure_message: Option<String>,
}

impl SessionController {
    /// Create a controller for `mode`.
    ///
    /// Fails with `UnknownMode` if the assembler's registry has no policy
    /// for it.
    pub fn new(
        mode: Mode,
        assembler: Arc<PromptAssembler>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        assembler.registry().get(mode)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                conversation: Conversation::new(mode),
                state: SessionState::Idle,
            })),
            assembler,
            transport,
            events: Arc::new(EventBus::default()),
            failure_message: None,
        })
    }

    /// Create a controller wired from configuration: registry with the
    /// configured reasoning budget, model names, language and apology.
    pub fn from_config(
        config: &AppConfig,
        mode: Mode,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let assembler = PromptAssembler::new(
            Arc::new(config.policy_registry()),
            config.model_catalog(),
        );
        let language = config.language_preference().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let mut controller = Self::new(mode, Arc::new(assembler), transport)?.with_language(language);
        if let Some(message) = &config.failure_message {
            controller = controller.with_failure_message(message.clone());
        }
        Ok(controller)
    }

    /// Publish on a shared bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Use a fixed apology instead of the localized one.
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    pub fn with_language(self, language: Option<LanguagePreference>) -> Self {
        self.lock().conversation.set_language(language);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn mode(&self) -> Mode {
        self.lock().conversation.mode()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.lock().conversation.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.events.subscribe()
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Submit user input and drive the response to a terminal state.
    ///
    /// Blank input without an attachment fails with `EmptyInput`; an image
    /// in a mode that cannot take one fails with `AttachmentNotSupported`.
    /// Neither changes any state. A call made while another submission is in
    /// flight returns [`SubmitOutcome::Busy`] and changes nothing.
    pub async fn submit(
        &self,
        input: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<SubmitOutcome> {
        self.run(input.into(), attachment, None).await
    }

    /// Like [`submit`](Self::submit), with `context_tag` applied to this one
    /// call. The conversation's own tag is left untouched.
    pub async fn submit_with_context(
        &self,
        input: impl Into<String>,
        context_tag: impl Into<String>,
    ) -> Result<SubmitOutcome> {
        self.run(input.into(), None, Some(context_tag.into())).await
    }

    async fn run(
        &self,
        input: String,
        attachment: Option<Attachment>,
        context_override: Option<String>,
    ) -> Result<SubmitOutcome> {
        if input.trim().is_empty() && attachment.is_none() {
            return Err(Error::EmptyInput);
        }

        let (request, target, snapshot) = {
            let mut guard = self.lock();
            let inner = &mut *guard;

            if inner.state != SessionState::Idle {
                debug!(state = ?inner.state, "Submission rejected, another is in flight");
                return Ok(SubmitOutcome::Busy);
            }

            let conversation = &inner.conversation;
            let context = context_override.as_deref().or(conversation.context_tag());
            let request = self.assembler.assemble(
                PromptInput::new(conversation.mode(), &input)
                    .with_history(conversation.messages())
                    .with_context(context)
                    .with_language(conversation.language())
                    .with_attachment(attachment.as_ref()),
            )?;

            let target = inner.conversation.begin_turn(input, attachment)?;
            inner.state = SessionState::Dispatching;
            (request, target, inner.conversation.snapshot())
        };

        let _in_flight = InFlightGuard {
            controller: self,
            target: target.clone(),
        };

        info!(
            mode = %request.mode,
            message_id = %target,
            model = %request.model,
            prior_turns = request.prior_turns.len(),
            "Dispatching request"
        );
        self.events.publish(SessionEvent::Submitted {
            message_id: target.clone(),
            snapshot,
        });

        let mut fragments = match self.transport.stream(request).await {
            Ok(rx) => rx,
            Err(e) => return Ok(self.fail(&target, Error::Transport(e))),
        };

        let mut received = 0usize;
        while let Some(item) = fragments.recv().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => return Ok(self.fail(&target, Error::Transport(e))),
            };
            if fragment.is_empty() {
                continue;
            }

            let snapshot = {
                let mut inner = self.lock();
                if !inner.conversation.append_fragment(&target, &fragment) {
                    debug!(message_id = %target, "Discarding fragment for abandoned message");
                    return Ok(SubmitOutcome::Abandoned(target));
                }
                inner.state = SessionState::Streaming;
                inner.conversation.snapshot()
            };
            received += 1;

            self.events.publish(SessionEvent::Fragment {
                message_id: target.clone(),
                fragment,
                snapshot,
            });
        }

        if received == 0 {
            return Ok(self.fail(&target, Error::EmptyResponse));
        }

        let snapshot = {
            let mut inner = self.lock();
            if !inner.conversation.complete(&target) {
                return Ok(SubmitOutcome::Abandoned(target));
            }
            inner.state = SessionState::Idle;
            inner.conversation.snapshot()
        };

        info!(message_id = %target, fragments = received, "Response complete");
        self.events.publish(SessionEvent::Completed {
            message_id: target.clone(),
            snapshot,
        });
        Ok(SubmitOutcome::Completed(target))
    }

    /// Replace the target with the apology and return to `Idle`.
    fn fail(&self, target: &MessageId, cause: Error) -> SubmitOutcome {
        match &cause {
            Error::EmptyResponse => {
                warn!(message_id = %target, "Service returned an empty response");
            }
            Error::Transport(TransportError::StreamInterrupted(reason)) => {
                warn!(message_id = %target, %reason, "Stream interrupted mid-response");
            }
            other => {
                warn!(message_id = %target, error = %other, "Transport failure");
            }
        }

        let snapshot = {
            let mut inner = self.lock();
            let text = self.failure_text(inner.conversation.language());
            if !inner.conversation.fail(target, &text) {
                return SubmitOutcome::Abandoned(target.clone());
            }
            inner.state = SessionState::Idle;
            inner.conversation.snapshot()
        };

        self.events.publish(SessionEvent::Failed {
            message_id: target.clone(),
            snapshot,
        });
        SubmitOutcome::Failed(target.clone())
    }

    /// Fail `target` if it is still in flight. Returns `false` when it was
    /// already settled or abandoned.
    fn settle_dropped(&self, target: &MessageId) -> bool {
        let snapshot = {
            let mut inner = self.lock();
            let text = self.failure_text(inner.conversation.language());
            if !inner.conversation.fail(target, &text) {
                return false;
            }
            inner.state = SessionState::Idle;
            inner.conversation.snapshot()
        };

        warn!(message_id = %target, "Submission dropped before the response finished");
        self.events.publish(SessionEvent::Failed {
            message_id: target.clone(),
            snapshot,
        });
        true
    }

    fn failure_text(&self, language: Option<LanguagePreference>) -> String {
        match &self.failure_message {
            Some(message) => message.clone(),
            None => language.unwrap_or_default().failure_message().to_string(),
        }
    }

    /// Clear the conversation and start over in `mode`.
    ///
    /// Any in-flight response is abandoned: its remaining fragments are
    /// discarded and it never touches the new conversation.
    pub fn switch_mode(&self, mode: Mode) -> Result<()> {
        self.assembler.registry().get(mode)?;
        self.clear(mode);
        Ok(())
    }

    /// Clear the conversation, staying in the current mode.
    pub fn reset(&self) {
        let mode = self.mode();
        self.clear(mode);
    }

    fn clear(&self, mode: Mode) {
        let snapshot = {
            let mut inner = self.lock();
            if inner.state != SessionState::Idle {
                debug!(state = ?inner.state, "Abandoning in-flight response");
            }
            inner.conversation.reset(mode);
            inner.state = SessionState::Idle;
            inner.conversation.snapshot()
        };
        info!(%mode, "Conversation cleared");
        self.events.publish(SessionEvent::Reset { snapshot });
    }

    /// Change the language preference for subsequent requests.
    pub fn set_language(&self, language: Option<LanguagePreference>) {
        let snapshot = {
            let mut inner = self.lock();
            inner.conversation.set_language(language);
            inner.conversation.snapshot()
        };
        self.events.publish(SessionEvent::LanguageChanged { snapshot });
    }

    /// Record the conversation's context tag. Only the first call takes
    /// effect; later calls return `false`.
    pub fn set_context_tag(&self, tag: impl Into<String>) -> bool {
        let snapshot = {
            let mut inner = self.lock();
            if !inner.conversation.set_context_tag(tag) {
                return false;
            }
            inner.conversation.snapshot()
        };
        self.events.publish(SessionEvent::ContextChanged { snapshot });
        true
    }
}

/// Releases the gate when a `submit` future is dropped mid-flight
/// (a timeout, a `select!` branch, an aborted task).
///
/// On every normal exit the target is already settled and this is a no-op.
struct InFlightGuard<'a> {
    controller: &'a SessionController,
    target: MessageId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.controller.settle_dropped(&self.target);
    }
}
