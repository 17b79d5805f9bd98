//! Interaction modes and the process-wide policy registry.
//!
//! Each mode maps to exactly one [`ModePolicy`]: which model tier serves it,
//! which instruction template shapes it, whether it carries conversation
//! history, and whether a reasoning budget applies. The registry is built
//! once at startup and refuses to exist unless every mode has an entry.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::templates;

/// A selectable interaction purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Chat,
    Knowledge,
    Writer,
    Vision,
    Translate,
    Grammar,
    Autocomplete,
    Etiquette,
}

impl Mode {
    /// Every mode the UI exposes.
    pub const ALL: [Mode; 8] = [
        Mode::Chat,
        Mode::Knowledge,
        Mode::Writer,
        Mode::Vision,
        Mode::Translate,
        Mode::Grammar,
        Mode::Autocomplete,
        Mode::Etiquette,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Knowledge => "knowledge",
            Self::Writer => "writer",
            Self::Vision => "vision",
            Self::Translate => "translate",
            Self::Grammar => "grammar",
            Self::Autocomplete => "autocomplete",
            Self::Etiquette => "etiquette",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| Error::UnknownMode(s.to_string()))
    }
}

/// Model capability tier. The concrete model name comes from a
/// [`ModelCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// High reasoning, creative work
    Pro,
    /// Fast, strict utility transforms
    Flash,
}

/// Concrete model names per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub pro: String,
    pub flash: String,
}

impl ModelCatalog {
    pub fn resolve(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Pro => &self.pro,
            ModelTier::Flash => &self.flash,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            pro: "gemini-3-pro-preview".into(),
            flash: "gemini-2.5-flash".into(),
        }
    }
}

/// Thinking-token budget forwarded to higher-tier models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningHint {
    pub budget_tokens: u32,
}

/// Default thinking budget for reasoning-heavy modes.
pub const DEFAULT_REASONING_BUDGET: u32 = 2048;

/// Immutable per-mode policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModePolicy {
    pub mode: Mode,

    pub tier: ModelTier,

    /// Instruction template; may contain `{context}`
    pub template: String,

    /// Multi-turn (prior turns replayed) vs. isolated single turn
    pub uses_history: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningHint>,

    /// Whether user messages in this mode may carry an image
    pub accepts_images: bool,

    /// Whether the language preference directive is appended. Off for modes
    /// whose output is raw text (translations, completions).
    pub follows_language: bool,
}

impl ModePolicy {
    fn new(mode: Mode, tier: ModelTier, template: &str) -> Self {
        Self {
            mode,
            tier,
            template: template.to_string(),
            uses_history: false,
            reasoning: None,
            accepts_images: false,
            follows_language: true,
        }
    }

    fn verbatim(mut self) -> Self {
        self.follows_language = false;
        self
    }

    fn conversational(mut self) -> Self {
        self.uses_history = true;
        self.accepts_images = true;
        self
    }

    fn reasoning(mut self, budget_tokens: u32) -> Self {
        // Thinking budgets are only honoured by the pro tier.
        if self.tier == ModelTier::Pro {
            self.reasoning = Some(ReasoningHint { budget_tokens });
        }
        self
    }
}

/// Lookup table from mode to policy.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<Mode, ModePolicy>,
}

impl PolicyRegistry {
    /// Build a registry from explicit policies.
    ///
    /// Fails with [`Error::UnknownMode`] naming the first mode that has no
    /// policy, and with [`Error::Config`] if a mode is listed twice.
    pub fn from_policies(policies: impl IntoIterator<Item = ModePolicy>) -> Result<Self> {
        let mut map = HashMap::new();
        for policy in policies {
            let mode = policy.mode;
            if map.insert(mode, policy).is_some() {
                return Err(Error::Config {
                    message: format!("duplicate policy for mode '{mode}'"),
                });
            }
        }

        if let Some(missing) = Mode::ALL.into_iter().find(|m| !map.contains_key(m)) {
            return Err(Error::UnknownMode(missing.to_string()));
        }

        Ok(Self { policies: map })
    }

    /// The built-in policy table with the default reasoning budget.
    pub fn builtin() -> Self {
        Self::with_reasoning_budget(DEFAULT_REASONING_BUDGET)
    }

    /// The built-in policy table with a custom reasoning budget.
    pub fn with_reasoning_budget(budget: u32) -> Self {
        use ModelTier::{Flash, Pro};

        let policies = [
            ModePolicy::new(Mode::Chat, Pro, templates::CHAT).conversational(),
            ModePolicy::new(Mode::Knowledge, Pro, templates::KNOWLEDGE)
                .conversational()
                .reasoning(budget),
            ModePolicy::new(Mode::Writer, Pro, templates::WRITER)
                .conversational()
                .reasoning(budget),
            ModePolicy::new(Mode::Vision, Pro, templates::VISION)
                .conversational()
                .reasoning(budget),
            ModePolicy::new(Mode::Translate, Flash, templates::TRANSLATE).verbatim(),
            ModePolicy::new(Mode::Grammar, Flash, templates::GRAMMAR),
            ModePolicy::new(Mode::Autocomplete, Flash, templates::AUTOCOMPLETE).verbatim(),
            ModePolicy::new(Mode::Etiquette, Flash, templates::ETIQUETTE),
        ];

        let policies = policies.into_iter().map(|p| (p.mode, p)).collect();
        Self { policies }
    }

    /// Look up the policy for a mode.
    pub fn get(&self, mode: Mode) -> Result<&ModePolicy> {
        self.policies
            .get(&mode)
            .ok_or_else(|| Error::UnknownMode(mode.to_string()))
    }

    /// Policies in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ModePolicy> {
        Mode::ALL.iter().filter_map(|m| self.policies.get(m))
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
