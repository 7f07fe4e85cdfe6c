//! Transport-neutral channel trait and event types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// Platform identity of a user.
pub type UserId = i64;

/// Platform identity of a chat (private chat, group, or channel).
pub type ChatId = i64;

/// Stream of inbound events produced by a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Who an inbound event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub username: Option<String>,
}

impl Sender {
    /// Sender in a private chat, where chat id equals user id.
    pub fn private(user_id: UserId) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// An uploaded file as declared by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    /// Opaque handle for re-sending the file through the transport.
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

impl DocumentUpload {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: None,
            mime_type: None,
            file_size: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// What an inbound event carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A slash command, name lowercased without the leading `/` or `@bot` suffix.
    Command { name: String, args: String },
    /// A plain text message.
    Text(String),
    /// A document upload.
    Document(DocumentUpload),
    /// An inline keyboard button press.
    Callback {
        id: String,
        data: String,
        /// The message that carried the keyboard, if the platform reports it.
        message_id: Option<i64>,
    },
    /// Anything else (photos, stickers, voice notes...).
    Unsupported,
}

/// A single event delivered by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Sender,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(sender: Sender, kind: EventKind) -> Self {
        Self { sender, kind }
    }

    pub fn command(sender: Sender, name: &str) -> Self {
        Self::new(
            sender,
            EventKind::Command {
                name: name.to_string(),
                args: String::new(),
            },
        )
    }

    pub fn text(sender: Sender, text: &str) -> Self {
        Self::new(sender, EventKind::Text(text.to_string()))
    }

    pub fn callback(sender: Sender, data: &str) -> Self {
        Self::new(
            sender,
            EventKind::Callback {
                id: format!("cb-{data}"),
                data: data.to_string(),
                message_id: None,
            },
        )
    }

    pub fn document(sender: Sender, document: DocumentUpload) -> Self {
        Self::new(sender, EventKind::Document(document))
    }
}

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// An inline keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Keyboard with one button per row.
    pub fn single_column<I, T, D>(buttons: I) -> Self
    where
        I: IntoIterator<Item = (T, D)>,
        T: Into<String>,
        D: Into<String>,
    {
        Self {
            rows: buttons
                .into_iter()
                .map(|(text, data)| {
                    vec![InlineButton {
                        text: text.into(),
                        callback_data: data.into(),
                    }]
                })
                .collect(),
        }
    }

    /// Render as a Bot API `reply_markup` object.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| {
                        serde_json::json!({
                            "text": b.text,
                            "callback_data": b.callback_data,
                        })
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({ "inline_keyboard": rows })
    }
}

/// A messaging transport: inbound event stream plus the outbound calls the
/// intake flow needs.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logs and errors.
    fn name(&self) -> &str;

    /// Start receiving events.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Send a plain text message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Re-send a previously received file by its handle, with a caption.
    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Check that the transport is reachable and the credentials work.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Gracefully shut down.
    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_json_shape() {
        let kb = InlineKeyboard::single_column([("English", "lang_en"), ("Русский", "lang_ru")]);
        let json = kb.to_json();
        let rows = json["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["text"], "English");
        assert_eq!(rows[1][0]["callback_data"], "lang_ru");
    }

    #[test]
    fn private_sender_shares_chat_id() {
        let s = Sender::private(42).with_username("john");
        assert_eq!(s.chat_id, 42);
        assert_eq!(s.username.as_deref(), Some("john"));
    }
}
