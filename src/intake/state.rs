//! Intake state machine — which field the applicant is being asked for.
//!
//! [`dispatch`] is the whole transition table: it maps the current session
//! and one input to the next session and a single [`Effect`] for the flow to
//! carry out. It performs no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::{DocumentUpload, EventKind, Sender};

use super::locale::MessageKey;
use super::model::{Language, NewApplication};
use super::validate::{validate_document, validate_phone};

/// The phases of the intake conversation.
///
/// Progresses linearly: AwaitingLanguage → AwaitingName → AwaitingPhone →
/// AwaitingPosition → AwaitingDocument → Completed. Cancelled is reachable
/// from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakePhase {
    AwaitingLanguage,
    AwaitingName,
    AwaitingPhone,
    AwaitingPosition,
    AwaitingDocument,
    Completed,
    Cancelled,
}

impl IntakePhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: IntakePhase) -> bool {
        use IntakePhase::*;
        if target == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, target),
            (AwaitingLanguage, AwaitingName)
                | (AwaitingName, AwaitingPhone)
                | (AwaitingPhone, AwaitingPosition)
                | (AwaitingPosition, AwaitingDocument)
                | (AwaitingDocument, Completed)
        )
    }

    /// Whether the conversation is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Get the next phase in the linear progression, if any.
    pub fn next(&self) -> Option<IntakePhase> {
        use IntakePhase::*;
        match self {
            AwaitingLanguage => Some(AwaitingName),
            AwaitingName => Some(AwaitingPhone),
            AwaitingPhone => Some(AwaitingPosition),
            AwaitingPosition => Some(AwaitingDocument),
            AwaitingDocument => Some(Completed),
            Completed | Cancelled => None,
        }
    }

    /// The prompt that asks for this phase's field.
    pub fn prompt(&self) -> Option<MessageKey> {
        match self {
            Self::AwaitingLanguage => Some(MessageKey::ChooseLanguage),
            Self::AwaitingName => Some(MessageKey::AskName),
            Self::AwaitingPhone => Some(MessageKey::AskPhone),
            Self::AwaitingPosition => Some(MessageKey::AskPosition),
            Self::AwaitingDocument => Some(MessageKey::AskCv),
            Self::Completed | Self::Cancelled => None,
        }
    }
}

impl Default for IntakePhase {
    fn default() -> Self {
        Self::AwaitingLanguage
    }
}

impl std::fmt::Display for IntakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingLanguage => "awaiting_language",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPhone => "awaiting_phone",
            Self::AwaitingPosition => "awaiting_position",
            Self::AwaitingDocument => "awaiting_document",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Field values collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub language: Option<Language>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
}

/// One applicant's in-progress conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: IntakePhase,
    pub draft: Draft,
    /// Last time the applicant sent anything.
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: IntakePhase::default(),
            draft: Draft::default(),
            updated_at: now,
        }
    }

    /// Language for replies; Russian until the applicant picks one.
    pub fn language(&self) -> Language {
        self.draft.language.unwrap_or_default()
    }

    /// Advance to the next phase. Returns an error if already at terminal phase.
    pub fn advance(&mut self) -> Result<IntakePhase, String> {
        let next = self
            .phase
            .next()
            .ok_or_else(|| "Already at terminal phase".to_string())?;
        if !self.phase.can_transition_to(next) {
            return Err(format!("Cannot transition from {} to {}", self.phase, next));
        }
        self.phase = next;
        Ok(next)
    }

    /// Mark the application as stored. Only valid while awaiting the document.
    pub fn complete(&mut self) -> Result<(), String> {
        if self.phase != IntakePhase::AwaitingDocument {
            return Err(format!("Cannot complete from {}", self.phase));
        }
        self.advance().map(|_| ())
    }

    /// Abandon the conversation. Valid from any non-terminal phase.
    pub fn cancel(&mut self) -> Result<(), String> {
        if !self.phase.can_transition_to(IntakePhase::Cancelled) {
            return Err(format!("Cannot cancel from {}", self.phase));
        }
        self.phase = IntakePhase::Cancelled;
        Ok(())
    }

    /// Build the insert payload once every text field is filled in.
    pub fn application(&self, sender: &Sender, document: DocumentUpload) -> Option<NewApplication> {
        Some(NewApplication {
            user_id: sender.user_id,
            chat_id: sender.chat_id,
            username: sender.username.clone(),
            language: self.draft.language?,
            full_name: self.draft.full_name.clone()?,
            phone: self.draft.phone.clone()?,
            position: self.draft.position.clone()?,
            document,
        })
    }
}

/// What the applicant did, as far as the state machine cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Cancel,
    Callback(String),
    Text(String),
    Document(DocumentUpload),
    Unsupported,
}

impl Input {
    /// Map a transport event. Unknown slash commands map to `None`.
    pub fn from_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Command { name, .. } => match name.as_str() {
                "start" => Some(Self::Start),
                "cancel" => Some(Self::Cancel),
                _ => None,
            },
            EventKind::Text(text) => Some(Self::Text(text)),
            EventKind::Document(doc) => Some(Self::Document(doc)),
            EventKind::Callback { data, .. } => Some(Self::Callback(data)),
            EventKind::Unsupported => Some(Self::Unsupported),
        }
    }
}

/// The single side effect a transition asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Trilingual greeting plus the language picker.
    Welcome,
    /// Show the language picker again.
    RepeatLanguagePicker,
    /// Language accepted; replace the picker with the name prompt.
    LanguageChosen(Language),
    /// Send a localized prompt or validation hint.
    Reply(Language, MessageKey),
    /// Store the application, notify the reviewer, thank the applicant.
    Submit(NewApplication),
    /// Session discarded; acknowledge.
    Cancelled(Language),
    /// Nothing to do.
    Ignore,
}

/// Apply one input to a session.
///
/// `/start` always opens a fresh session; `/cancel` always ends it. A valid
/// document yields [`Effect::Submit`] and leaves the session in
/// `AwaitingDocument`; the caller completes it once the record is stored.
pub fn dispatch(
    session: Option<SessionState>,
    sender: &Sender,
    input: Input,
    now: DateTime<Utc>,
) -> (Option<SessionState>, Effect) {
    let (mut session, input) = match (session, input) {
        (_, Input::Start) => return (Some(SessionState::new(now)), Effect::Welcome),
        (session, Input::Cancel) => {
            let lang = session.as_ref().map(|s| s.language()).unwrap_or_default();
            if let Some(mut session) = session.filter(|s| !s.phase.is_terminal()) {
                if let Err(e) = session.cancel() {
                    tracing::warn!(user_id = sender.user_id, "Failed to cancel session: {}", e);
                }
                tracing::debug!(user_id = sender.user_id, phase = %session.phase, "Session discarded");
            }
            return (None, Effect::Cancelled(lang));
        }
        (Some(session), input) if !session.phase.is_terminal() => (session, input),
        _ => return (None, Effect::Ignore),
    };

    session.updated_at = now;
    let lang = session.language();

    let effect = match (session.phase, input) {
        (IntakePhase::AwaitingLanguage, Input::Callback(data)) => {
            match Language::from_callback(&data) {
                Some(chosen) => {
                    session.draft.language = Some(chosen);
                    advance(&mut session);
                    Effect::LanguageChosen(chosen)
                }
                None => Effect::Ignore,
            }
        }
        (IntakePhase::AwaitingLanguage, _) => Effect::RepeatLanguagePicker,

        // Stale picker buttons after the language is set.
        (_, Input::Callback(_)) => Effect::Ignore,

        (IntakePhase::AwaitingName, Input::Text(text)) => {
            session.draft.full_name = Some(text.trim().to_string());
            advance(&mut session);
            Effect::Reply(lang, MessageKey::AskPhone)
        }

        (IntakePhase::AwaitingPhone, Input::Text(text)) => match validate_phone(&text) {
            Ok(phone) => {
                session.draft.phone = Some(phone);
                advance(&mut session);
                Effect::Reply(lang, MessageKey::AskPosition)
            }
            Err(_) => Effect::Reply(lang, MessageKey::BadPhone),
        },

        (IntakePhase::AwaitingPosition, Input::Text(text)) => {
            session.draft.position = Some(text.trim().to_string());
            advance(&mut session);
            Effect::Reply(lang, MessageKey::AskCv)
        }

        (IntakePhase::AwaitingDocument, Input::Document(doc)) => match validate_document(&doc) {
            Ok(()) => match session.application(sender, doc) {
                Some(app) => Effect::Submit(app),
                None => {
                    tracing::warn!(
                        user_id = sender.user_id,
                        "Draft incomplete at document step; restarting"
                    );
                    return (Some(SessionState::new(now)), Effect::Welcome);
                }
            },
            Err(_) => Effect::Reply(lang, MessageKey::BadCv),
        },
        (IntakePhase::AwaitingDocument, _) => Effect::Reply(lang, MessageKey::BadCv),

        // Non-text input while a text field is awaited: ask again.
        (phase, _) => match phase.prompt() {
            Some(key) => Effect::Reply(lang, key),
            None => Effect::Ignore,
        },
    };

    (Some(session), effect)
}

fn advance(session: &mut SessionState) {
    if let Err(e) = session.advance() {
        tracing::warn!("Failed to advance intake phase: {}", e);
    }
}
