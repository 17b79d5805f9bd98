//! Prompt assembly: turns a mode, its qualifiers and the conversation so far
//! into a complete, transport-ready request description.
//!
//! Assembly is pure: no I/O, and the same inputs always produce the same
//! request.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{Attachment, Message, MessageStatus, Role};
use crate::mode::{Mode, ModelCatalog, ModelTier, PolicyRegistry, ReasoningHint};
use crate::templates;

/// The user's language level / locale hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguagePreference {
    /// Native or advanced speaker: answer fully in Minang (`min`)
    #[default]
    #[serde(rename = "min")]
    Minang,
    /// Learner reading Indonesian (`id`)
    #[serde(rename = "id")]
    Indonesian,
    /// Learner reading English (`en`)
    #[serde(rename = "en")]
    English,
}

impl LanguagePreference {
    pub fn locale(self) -> &'static str {
        match self {
            Self::Minang => "min",
            Self::Indonesian => "id",
            Self::English => "en",
        }
    }

    /// The directive appended to the instruction.
    pub fn directive(self) -> String {
        match self {
            Self::Minang => templates::IMMERSION.to_string(),
            Self::Indonesian => templates::SCAFFOLDED.replace("{language}", "Indonesian"),
            Self::English => templates::SCAFFOLDED.replace("{language}", "English"),
        }
    }

    /// Apology shown in place of a failed assistant message.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Minang => "Maaf Sanak, ado gangguan jaringan. Cubo ulang liak yo. 🙏",
            Self::Indonesian => "Maaf, terjadi kesalahan jaringan.",
            Self::English => "Sorry, a network error occurred. Please try again.",
        }
    }
}

impl std::fmt::Display for LanguagePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.locale())
    }
}

impl FromStr for LanguagePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" | "minang" => Ok(Self::Minang),
            "id" | "indonesian" => Ok(Self::Indonesian),
            "en" | "english" => Ok(Self::English),
            other => Err(Error::Config {
                message: format!("unknown language preference '{other}'"),
            }),
        }
    }
}

/// One earlier turn, flattened to role and final text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorTurn {
    pub role: Role,
    pub text: String,
}

/// How the transport must submit the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnShape {
    /// Prior turns go along as conversation context
    MultiTurn,
    /// Only the current input is sent
    SingleTurn,
}

/// A complete request description, ready for a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledRequest {
    pub mode: Mode,

    /// Concrete model name resolved from the tier
    pub model: String,

    pub model_tier: ModelTier,

    /// Persona preamble + mode template + language directive
    pub instruction: String,

    /// Empty for single-turn modes
    pub prior_turns: Vec<PriorTurn>,

    pub current_input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningHint>,

    pub shape: TurnShape,
}

/// Everything the assembler needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub mode: Mode,
    pub context_tag: Option<&'a str>,
    pub language: Option<LanguagePreference>,
    /// Conversation messages *before* the new submission
    pub history: &'a [Message],
    pub input: &'a str,
    pub attachment: Option<&'a Attachment>,
}

impl<'a> PromptInput<'a> {
    pub fn new(mode: Mode, input: &'a str) -> Self {
        Self {
            mode,
            context_tag: None,
            language: None,
            history: &[],
            input,
            attachment: None,
        }
    }

    pub fn with_history(mut self, history: &'a [Message]) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context_tag: Option<&'a str>) -> Self {
        self.context_tag = context_tag;
        self
    }

    pub fn with_language(mut self, language: Option<LanguagePreference>) -> Self {
        self.language = language;
        self
    }

    pub fn with_attachment(mut self, attachment: Option<&'a Attachment>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// Builds [`AssembledRequest`]s from the policy registry.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    registry: Arc<PolicyRegistry>,
    catalog: ModelCatalog,
    persona: String,
}

impl PromptAssembler {
    pub fn new(registry: Arc<PolicyRegistry>, catalog: ModelCatalog) -> Self {
        Self {
            registry,
            catalog,
            persona: templates::PERSONA.to_string(),
        }
    }

    /// Replace the persona preamble.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Assemble a request.
    ///
    /// Fails with [`Error::EmptyInput`] when the input is blank and there is
    /// no attachment, [`Error::UnknownMode`] when the registry has no policy,
    /// and [`Error::AttachmentNotSupported`] when an image is sent to a mode
    /// that cannot take one.
    pub fn assemble(&self, input: PromptInput<'_>) -> Result<AssembledRequest> {
        if input.input.trim().is_empty() && input.attachment.is_none() {
            return Err(Error::EmptyInput);
        }

        let policy = self.registry.get(input.mode)?;

        if input.attachment.is_some() && !policy.accepts_images {
            return Err(Error::AttachmentNotSupported(input.mode));
        }

        let (prior_turns, shape) = if policy.uses_history {
            (project_history(input.history), TurnShape::MultiTurn)
        } else {
            (Vec::new(), TurnShape::SingleTurn)
        };

        let language = if policy.follows_language {
            input.language
        } else {
            None
        };

        let instruction = self.instruction(&policy.template, input.context_tag, language);

        debug!(
            mode = %input.mode,
            prior_turns = prior_turns.len(),
            has_attachment = input.attachment.is_some(),
            "Assembled request"
        );

        Ok(AssembledRequest {
            mode: input.mode,
            model: self.catalog.resolve(policy.tier).to_string(),
            model_tier: policy.tier,
            instruction,
            prior_turns,
            current_input: input.input.to_string(),
            attachment: input.attachment.cloned(),
            reasoning: policy.reasoning,
            shape,
        })
    }

    /// Render the full instruction text for a template.
    fn instruction(
        &self,
        template: &str,
        context_tag: Option<&str>,
        language: Option<LanguagePreference>,
    ) -> String {
        let context = context_tag
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(templates::DEFAULT_CONTEXT);

        let mut instruction = format!("{}\n\n{}", self.persona, template.replace("{context}", context));

        if let Some(language) = language {
            instruction.push_str("\n\n");
            instruction.push_str(&language.directive());
        }

        instruction
    }
}

/// Flatten finished messages into prior turns. In-flight and failed
/// messages are skipped; attachments are never replayed.
pub fn project_history(messages: &[Message]) -> Vec<PriorTurn> {
    messages
        .iter()
        .filter(|m| m.status == MessageStatus::Complete)
        .map(|m| PriorTurn {
            role: m.role,
            text: m.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Conversation;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(Arc::new(PolicyRegistry::builtin()), ModelCatalog::default())
    }

    fn chat_history() -> Conversation {
        let mut conv = Conversation::new(Mode::Chat);
        let a = conv.begin_turn("Apo kaba, Baso?", None).unwrap();
        conv.append_fragment(&a, "Alhamdulillah, baiak.");
        conv.complete(&a);
        let b = conv.begin_turn("Ceritakan rendang", None).unwrap();
        conv.append_fragment(&b, "Rendang dimasak lamo.");
        conv.complete(&b);
        conv
    }

    #[test]
    fn translate_scenario_is_single_turn() {
        let req = assembler()
            .assemble(PromptInput::new(Mode::Translate, "Terima kasih banyak"))
            .unwrap();

        assert!(req.prior_turns.is_empty());
        assert_eq!(req.shape, TurnShape::SingleTurn);
        assert!(req.instruction.contains("MODE: TRANSLATOR"));
        assert!(req.instruction.starts_with(templates::PERSONA));
        assert_eq!(req.current_input, "Terima kasih banyak");
        assert_eq!(req.model, "gemini-2.5-flash");
        assert!(req.reasoning.is_none());
    }

    #[test]
    fn stateless_mode_ignores_existing_history() {
        let conv = chat_history();
        let req = assembler()
            .assemble(PromptInput::new(Mode::Grammar, "Ambo pai ka pasa").with_history(conv.messages()))
            .unwrap();
        assert!(req.prior_turns.is_empty());
    }

    #[test]
    fn stateful_mode_replays_complete_messages_in_order() {
        let conv = chat_history();
        let req = assembler()
            .assemble(PromptInput::new(Mode::Chat, "Baa caro mamasaknyo?").with_history(conv.messages()))
            .unwrap();

        assert_eq!(req.shape, TurnShape::MultiTurn);
        let texts: Vec<_> = req.prior_turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Apo kaba, Baso?",
                "Alhamdulillah, baiak.",
                "Ceritakan rendang",
                "Rendang dimasak lamo."
            ]
        );
        assert_eq!(req.prior_turns[0].role, Role::User);
        assert_eq!(req.prior_turns[1].role, Role::Assistant);
        assert_eq!(req.model, "gemini-3-pro-preview");
    }

    #[test]
    fn failed_and_in_flight_messages_are_not_replayed() {
        let mut conv = Conversation::new(Mode::Chat);
        let a = conv.begin_turn("first", None).unwrap();
        conv.fail(&a, "apology");
        conv.begin_turn("second", None).unwrap();

        let turns = project_history(conv.messages());
        let texts: Vec<_> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn attachments_are_not_replayed_into_history() {
        let mut conv = Conversation::new(Mode::Vision);
        let image = Attachment::from_bytes("image/png", &[7, 7, 7]);
        let a = conv.begin_turn("Apo ko?", Some(image)).unwrap();
        conv.append_fragment(&a, "Rumah gadang.");
        conv.complete(&a);

        let req = assembler()
            .assemble(PromptInput::new(Mode::Vision, "Sia nan mambangun?").with_history(conv.messages()))
            .unwrap();
        assert_eq!(req.prior_turns[0].text, "Apo ko?");
        assert!(req.attachment.is_none());
    }

    #[test]
    fn blank_input_without_attachment_is_rejected() {
        let result = assembler().assemble(PromptInput::new(Mode::Chat, "   \n"));
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn image_alone_is_enough_in_vision_mode() {
        let image = Attachment::from_bytes("image/jpeg", &[1, 2]);
        let req = assembler()
            .assemble(PromptInput::new(Mode::Vision, "").with_attachment(Some(&image)))
            .unwrap();
        assert_eq!(req.attachment.as_ref(), Some(&image));
        assert_eq!(req.shape, TurnShape::MultiTurn);
        assert!(req.reasoning.is_some());
    }

    #[test]
    fn image_in_text_only_mode_is_rejected() {
        let image = Attachment::from_bytes("image/jpeg", &[1, 2]);
        let result = assembler()
            .assemble(PromptInput::new(Mode::Translate, "baca ini").with_attachment(Some(&image)));
        assert!(matches!(result, Err(Error::AttachmentNotSupported(Mode::Translate))));
    }

    #[test]
    fn image_submission_follows_history_policy() {
        let conv = chat_history();
        let image = Attachment::from_bytes("image/png", &[9]);
        let with_image = assembler()
            .assemble(
                PromptInput::new(Mode::Chat, "Iko apo?")
                    .with_history(conv.messages())
                    .with_attachment(Some(&image)),
            )
            .unwrap();
        let text_only = assembler()
            .assemble(PromptInput::new(Mode::Chat, "Iko apo?").with_history(conv.messages()))
            .unwrap();

        assert!(with_image.attachment.is_some());
        assert_eq!(with_image.prior_turns, text_only.prior_turns);
        assert_eq!(with_image.shape, text_only.shape);
    }

    #[test]
    fn context_tag_is_interpolated() {
        let req = assembler()
            .assemble(PromptInput::new(Mode::Etiquette, "Aden pai dulu").with_context(Some("Parents")))
            .unwrap();
        assert!(req.instruction.contains("LISTENER: Parents"));
        assert!(!req.instruction.contains("{context}"));

        let req = assembler()
            .assemble(PromptInput::new(Mode::Etiquette, "Aden pai dulu"))
            .unwrap();
        assert!(req.instruction.contains("LISTENER: General"));
    }

    #[test]
    fn language_directive_selects_tier() {
        let immersion = assembler()
            .assemble(
                PromptInput::new(Mode::Chat, "Apo kaba?").with_language(Some(LanguagePreference::Minang)),
            )
            .unwrap();
        assert!(immersion.instruction.contains("Full immersion"));

        let scaffolded = assembler()
            .assemble(
                PromptInput::new(Mode::Chat, "How are you?")
                    .with_language(Some(LanguagePreference::English)),
            )
            .unwrap();
        assert!(scaffolded.instruction.contains("Answer in English"));
    }

    #[test]
    fn translation_output_is_not_steered_by_language() {
        let req = assembler()
            .assemble(
                PromptInput::new(Mode::Translate, "Selamat pagi")
                    .with_language(Some(LanguagePreference::English)),
            )
            .unwrap();
        assert!(!req.instruction.contains("LANGUAGE:"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let conv = chat_history();
        let build = || {
            assembler()
                .assemble(
                    PromptInput::new(Mode::Knowledge, "Pagaruyung")
                        .with_history(conv.messages())
                        .with_language(Some(LanguagePreference::Indonesian)),
                )
                .unwrap()
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_persona_replaces_preamble() {
        let req = assembler()
            .with_persona("You are a test double.")
            .assemble(PromptInput::new(Mode::Chat, "hi"))
            .unwrap();
        assert!(req.instruction.starts_with("You are a test double."));
    }

    #[test]
    fn language_preference_parsing() {
        assert_eq!("EN".parse::<LanguagePreference>().unwrap(), LanguagePreference::English);
        assert_eq!("min".parse::<LanguagePreference>().unwrap(), LanguagePreference::Minang);
        assert!("fr".parse::<LanguagePreference>().is_err());
        assert_eq!(
            serde_json::to_string(&LanguagePreference::Indonesian).unwrap(),
            r#""id""#
        );
    }
}
