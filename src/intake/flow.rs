//! Intake flow — runs the state machine against a channel and a store.
//!
//! The event loop, per-event handling, and the side effects of each
//! [`Effect`]: replies, the language picker, and the submit sequence
//! (durable insert, reviewer forward, thank-you).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, ChatId, EventKind, InboundEvent};
use crate::config::BotConfig;
use crate::error::{ChannelError, Error};
use crate::store::ApplicationStore;

use super::locale::{Catalog, MessageKey, language_keyboard};
use super::model::{Language, NewApplication};
use super::sessions::{SessionGuard, SessionStore, spawn_pruning_task};
use super::state::{Effect, Input, dispatch};

/// Tunables for the intake flow.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Chat that receives completed applications. `None` disables forwarding.
    pub reviewer_chat_id: Option<ChatId>,
    /// Upper bound on the reviewer forward.
    pub forward_timeout: Duration,
    /// Sessions idle longer than this are pruned.
    pub session_idle_timeout: Duration,
    /// How often the pruning task runs.
    pub prune_interval: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            reviewer_chat_id: None,
            forward_timeout: Duration::from_secs(15),
            session_idle_timeout: Duration::from_secs(24 * 3600),
            prune_interval: Duration::from_secs(600), // Every 10 min
        }
    }
}

impl From<&BotConfig> for IntakeConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            reviewer_chat_id: config.reviewer_chat_id,
            forward_timeout: config.forward_timeout,
            session_idle_timeout: config.session_idle_timeout,
            ..Self::default()
        }
    }
}

/// Shared components the flow drives.
pub struct IntakeDeps {
    pub channel: Arc<dyn Channel>,
    pub store: Arc<dyn ApplicationStore>,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionStore>,
}

/// The application intake bot.
pub struct IntakeFlow {
    config: IntakeConfig,
    deps: IntakeDeps,
}

impl IntakeFlow {
    pub fn new(config: IntakeConfig, deps: IntakeDeps) -> Self {
        Self { config, deps }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.deps.sessions
    }

    fn channel(&self) -> &dyn Channel {
        self.deps.channel.as_ref()
    }

    // ── Main loop ───────────────────────────────────────────────────

    /// Consume the channel's events until it ends or Ctrl+C.
    ///
    /// Events are handled one at a time. A failed event is logged and the
    /// loop moves on.
    pub async fn run(self) -> Result<(), Error> {
        let mut events = self.channel().start().await?;

        let pruning_handle = spawn_pruning_task(
            Arc::clone(&self.deps.sessions),
            self.config.session_idle_timeout,
            self.config.prune_interval,
        );

        info!(channel = self.channel().name(), "Intake bot ready and listening");

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        info!("Event stream ended, shutting down...");
                        break;
                    }
                }
            };

            let user_id = event.sender.user_id;
            if let Err(e) = self.handle(event).await {
                error!(user_id, error = %e, "Error handling event");
            }
        }

        pruning_handle.abort();
        self.channel().shutdown().await?;
        Ok(())
    }

    // ── Event handling ──────────────────────────────────────────────

    /// Handle one inbound event to completion.
    ///
    /// Holds the sender's session lock throughout, so events from one user
    /// never interleave.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), Error> {
        let InboundEvent { sender, kind } = event;

        let picker_message_id = match &kind {
            EventKind::Callback { id, message_id, .. } => {
                if let Err(e) = self.channel().answer_callback(id).await {
                    warn!(user_id = sender.user_id, error = %e, "Failed to answer callback");
                }
                *message_id
            }
            _ => None,
        };

        let Some(input) = Input::from_event(kind) else {
            debug!(user_id = sender.user_id, "Ignoring unknown command");
            return Ok(());
        };

        let mut slot = self.deps.sessions.lock(sender.user_id).await;
        let (next, effect) = dispatch(slot.take(), &sender, input, Utc::now());
        *slot = next;

        if let Some(session) = slot.as_ref() {
            debug!(user_id = sender.user_id, phase = %session.phase, "Intake step");
        }

        let chat_id = sender.chat_id;
        match effect {
            Effect::Ignore => Ok(()),
            Effect::Welcome => {
                let keyboard = language_keyboard();
                self.channel()
                    .send_text(chat_id, &self.deps.catalog.welcome(), Some(&keyboard))
                    .await?;
                Ok(())
            }
            Effect::RepeatLanguagePicker => {
                let keyboard = language_keyboard();
                self.channel()
                    .send_text(
                        chat_id,
                        &self.deps.catalog.choose_language_all(),
                        Some(&keyboard),
                    )
                    .await?;
                Ok(())
            }
            Effect::LanguageChosen(lang) => {
                info!(user_id = sender.user_id, lang = %lang, "Language chosen");
                self.show_name_prompt(chat_id, picker_message_id, lang).await
            }
            Effect::Reply(lang, key) => self.reply(chat_id, lang, key).await,
            Effect::Cancelled(lang) => {
                info!(user_id = sender.user_id, "Intake cancelled");
                self.reply(chat_id, lang, MessageKey::Cancelled).await
            }
            Effect::Submit(application) => self.submit(&mut slot, application).await,
        }
    }

    async fn reply(&self, chat_id: ChatId, lang: Language, key: MessageKey) -> Result<(), Error> {
        self.channel()
            .send_text(chat_id, self.deps.catalog.get(lang, key), None)
            .await?;
        Ok(())
    }

    /// Replace the picker with the name prompt, or send it fresh when the
    /// picker message is unknown or can no longer be edited.
    async fn show_name_prompt(
        &self,
        chat_id: ChatId,
        picker_message_id: Option<i64>,
        lang: Language,
    ) -> Result<(), Error> {
        let text = self.deps.catalog.get(lang, MessageKey::AskName);
        if let Some(message_id) = picker_message_id {
            match self.channel().edit_text(chat_id, message_id, text).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(chat_id, error = %e, "Failed to edit picker, sending instead"),
            }
        }
        self.channel().send_text(chat_id, text, None).await?;
        Ok(())
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Store the application, forward it to the reviewer, thank the applicant.
    ///
    /// On a store failure the session stays at the document step and the
    /// applicant is asked to try again.
    async fn submit(
        &self,
        slot: &mut SessionGuard,
        application: NewApplication,
    ) -> Result<(), Error> {
        let lang = application.language;
        let chat_id = application.chat_id;

        let record = match self
            .deps
            .store
            .insert_application(&application, Utc::now())
            .await
        {
            Ok(record) => record,
            Err(e) => {
                if let Err(send_err) = self.reply(chat_id, lang, MessageKey::SubmitFailed).await {
                    warn!(chat_id, error = %send_err, "Failed to report store failure");
                }
                return Err(e.into());
            }
        };

        if let Some(mut session) = slot.take() {
            if let Err(e) = session.complete() {
                warn!(user_id = application.user_id, "Failed to complete session: {}", e);
            }
        }

        info!(
            application_id = record.id,
            user_id = application.user_id,
            lang = %lang,
            "Application stored"
        );

        if let Err(e) = self.forward_to_reviewer(&application).await {
            warn!(
                application_id = record.id,
                error = %e,
                "Failed to forward application to reviewer"
            );
        }

        self.reply(chat_id, lang, MessageKey::Thanks).await
    }

    /// Send the CV with a summary caption to the reviewer chat.
    ///
    /// No-op when no reviewer is configured or the applicant is the reviewer.
    async fn forward_to_reviewer(&self, application: &NewApplication) -> Result<(), ChannelError> {
        let Some(reviewer) = self.config.reviewer_chat_id else {
            return Ok(());
        };
        if reviewer == application.chat_id {
            debug!(chat_id = reviewer, "Applicant is the reviewer; skipping forward");
            return Ok(());
        }

        let caption = application.reviewer_caption();
        let send = self.channel().send_document(
            reviewer,
            &application.document.file_id,
            Some(&caption),
        );
        match tokio::time::timeout(self.config.forward_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                name: self.channel().name().to_string(),
                secs: self.config.forward_timeout.as_secs(),
            }),
        }
    }
}
