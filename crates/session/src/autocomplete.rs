//! Debounced sentence completion while the user types.
//!
//! A degenerate conversation: always the `autocomplete` mode, always
//! single-turn, at most one request alive. Every `update` supersedes the
//! previous one; a completion is requested only after the input has been
//! quiet for the configured window, and its result is published only if no
//! newer input arrived in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use baso_config::AutocompleteConfig;
use baso_core::mode::Mode;
use baso_core::prompt::{PromptAssembler, PromptInput};
use baso_core::transport::Transport;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Shared {
    assembler: Arc<PromptAssembler>,
    transport: Arc<dyn Transport>,
    quiet_window: Duration,
    min_chars: usize,
    generation: AtomicU64,
    suggestion: watch::Sender<Option<String>>,
}

/// Suggests a continuation for text being typed.
pub struct Autocompleter {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Autocompleter {
    pub fn new(
        assembler: Arc<PromptAssembler>,
        transport: Arc<dyn Transport>,
        config: &AutocompleteConfig,
    ) -> Self {
        let (suggestion, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                assembler,
                transport,
                quiet_window: config.quiet_window(),
                min_chars: config.min_chars,
                generation: AtomicU64::new(0),
                suggestion,
            }),
            task: Mutex::new(None),
        }
    }

    /// Observe suggestions as they are published.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.shared.suggestion.subscribe()
    }

    /// The current suggestion, if any.
    pub fn suggestion(&self) -> Option<String> {
        self.shared.suggestion.borrow().clone()
    }

    /// The input changed. Cancels any scheduled or in-flight completion and
    /// schedules a new one after the quiet window.
    pub fn update(&self, input: &str) {
        let generation = self.supersede();

        if input.trim().is_empty() || input.chars().count() < self.shared.min_chars {
            self.shared.suggestion.send_replace(None);
            return;
        }

        let shared = self.shared.clone();
        let input = input.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(shared.quiet_window).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }

            let suggestion = match shared.complete(&input).await {
                Ok(text) => Some(text).filter(|t| !t.is_empty()),
                Err(e) => {
                    warn!(error = %e, "Autocomplete failed");
                    None
                }
            };

            if shared.generation.load(Ordering::SeqCst) == generation {
                debug!(found = suggestion.is_some(), "Autocomplete settled");
                shared.suggestion.send_replace(suggestion);
            }
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Join the current suggestion onto `input` and clear it.
    ///
    /// Returns `input` unchanged when there is no suggestion.
    pub fn accept(&self, input: &str) -> String {
        self.supersede();
        match self.shared.suggestion.send_replace(None) {
            Some(suggestion) => apply_suggestion(input, &suggestion),
            None => input.to_string(),
        }
    }

    /// Invalidate outstanding work and return the new generation.
    fn supersede(&self) -> u64 {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
        generation
    }
}

impl Drop for Autocompleter {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

impl Shared {
    /// Run one single-turn request and collect the whole response silently.
    async fn complete(&self, input: &str) -> baso_core::Result<String> {
        let request = self
            .assembler
            .assemble(PromptInput::new(Mode::Autocomplete, input))?;
        let mut fragments = self.transport.stream(request).await?;

        let mut text = String::new();
        while let Some(fragment) = fragments.recv().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Join a suggestion onto the typed text.
///
/// A space is inserted unless the input already ends with one; the
/// suggestion is trimmed and loses one leading and one trailing `.`. A
/// suggestion with nothing left after that leaves `input` unchanged.
pub fn apply_suggestion(input: &str, suggestion: &str) -> String {
    let trimmed = suggestion.trim();
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return input.to_string();
    }

    let separator = if input.ends_with(' ') { "" } else { " " };
    format!("{input}{separator}{trimmed}")
}
