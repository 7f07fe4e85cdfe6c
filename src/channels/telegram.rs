//! Telegram channel — long-polls the Bot API for updates.
//!
//! Plain `reqwest` + JSON against the Bot API. Inbound updates are parsed into
//! transport-neutral [`InboundEvent`]s; outbound calls cover plain text,
//! inline keyboards, message edits, callback acknowledgements and re-sending a
//! document by its `file_id`.

use std::sync::OnceLock;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{
    Channel, ChatId, DocumentUpload, EventKind, EventStream, InboundEvent, InlineKeyboard, Sender,
};
use crate::config::DEFAULT_API_BASE;
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
    /// Username reported by getMe; commands addressed to other bots are dropped.
    bot_username: OnceLock<String>,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            bot_username: OnceLock::new(),
        }
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The bot's own username, known after a successful health check.
    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.get().map(String::as_str)
    }

    fn api_url(&self, method: &str) -> String {
        method_url(&self.api_base, &self.bot_token, method)
    }

    /// POST a JSON body to a Bot API method and check the response.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method}: {}", e.without_url()),
            })?;

        let status = resp.status();
        let data: Value = resp.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let description = api_description(&data).unwrap_or("no description");
            return Err(ChannelError::Http(format!(
                "{method} returned {status}: {description}"
            )));
        }
        if data.get("ok").and_then(Value::as_bool) == Some(false) {
            let description = api_description(&data).unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} rejected: {description}"),
            });
        }

        Ok(data)
    }

    /// Send a single message chunk (≤4096 chars).
    async fn send_message_chunk(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = kb.to_json();
        }
        self.call("sendMessage", &body).await.map(|_| ())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();
        let bot_username = self.bot_username.get().cloned();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    let description = api_description(&data).unwrap_or_default();
                    tracing::warn!(description, "Telegram getUpdates returned no result");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update, bot_username.as_deref()) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    /// Splits long messages that exceed Telegram's 4096 char limit; the
    /// keyboard rides on the last chunk.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let kb = if i == last { keyboard } else { None };
            self.send_message_chunk(chat_id, chunk, kb).await?;
        }
        Ok(())
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        self.call("editMessageText", &body).await.map(|_| ())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "document": file_id,
        });
        if let Some(cap) = caption {
            body["caption"] = Value::String(cap.to_string());
        }
        self.call("sendDocument", &body).await?;
        tracing::info!(chat_id, "Telegram document sent");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {status}"),
            });
        }

        let data: Value = resp.json().await.unwrap_or(Value::Null);
        match data.pointer("/result/username").and_then(Value::as_str) {
            Some(username) => {
                tracing::info!(username, "Telegram bot identified");
                let _ = self.bot_username.set(username.to_string());
            }
            None => tracing::warn!("getMe returned no username; accepting commands for any bot"),
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Human-readable error text from a Bot API response body.
fn api_description(data: &Value) -> Option<&str> {
    data.get("description").and_then(Value::as_str)
}

fn method_url(api_base: &str, token: &SecretString, method: &str) -> String {
    format!("{api_base}/bot{}/{method}", token.expose_secret())
}

/// Parse a single `getUpdates` entry into an inbound event.
///
/// Returns `None` for updates the bot does not handle (edited messages,
/// channel posts, updates without a sender) and for commands addressed to a
/// different bot (`/start@OtherBot`). With no `bot_username` every command
/// suffix is accepted.
pub fn parse_update(update: &Value, bot_username: Option<&str>) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        return parse_callback(query);
    }

    let message = update.get("message")?;
    let sender = parse_sender(message.get("from")?, message.get("chat"))?;

    if let Some(text) = message.get("text").and_then(Value::as_str) {
        let kind = match parse_command(text) {
            Some(command) if !command.is_addressed_to(bot_username) => {
                tracing::debug!(target_bot = ?command.target, "Ignoring command for another bot");
                return None;
            }
            Some(command) => EventKind::Command {
                name: command.name,
                args: command.args,
            },
            None => EventKind::Text(text.to_string()),
        };
        return Some(InboundEvent::new(sender, kind));
    }

    if let Some(doc) = message.get("document") {
        let file_id = doc.get("file_id").and_then(Value::as_str)?;
        let document = DocumentUpload {
            file_id: file_id.to_string(),
            file_name: doc.get("file_name").and_then(Value::as_str).map(String::from),
            mime_type: doc.get("mime_type").and_then(Value::as_str).map(String::from),
            file_size: doc.get("file_size").and_then(Value::as_u64),
        };
        return Some(InboundEvent::new(sender, EventKind::Document(document)));
    }

    Some(InboundEvent::new(sender, EventKind::Unsupported))
}

fn parse_callback(query: &Value) -> Option<InboundEvent> {
    let id = query.get("id").and_then(Value::as_str)?.to_string();
    let message = query.get("message");
    let sender = parse_sender(query.get("from")?, message.and_then(|m| m.get("chat")))?;
    let data = query
        .get("data")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message_id = message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64);

    Some(InboundEvent::new(
        sender,
        EventKind::Callback {
            id,
            data,
            message_id,
        },
    ))
}

fn parse_sender(from: &Value, chat: Option<&Value>) -> Option<Sender> {
    let user_id = from.get("id").and_then(Value::as_i64)?;
    // Without a chat (inline-mode callbacks) reply to the user directly.
    let chat_id = chat
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .unwrap_or(user_id);

    Some(Sender {
        user_id,
        chat_id,
        username: from
            .get("username")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// A slash command as typed: `/name@target args`.
#[derive(Debug, PartialEq, Eq)]
struct CommandText {
    /// Lowercased, without the leading `/`.
    name: String,
    /// Bot named after `@`, if any.
    target: Option<String>,
    args: String,
}

impl CommandText {
    fn is_addressed_to(&self, bot_username: Option<&str>) -> bool {
        match (self.target.as_deref(), bot_username) {
            (Some(target), Some(me)) => target.eq_ignore_ascii_case(me),
            _ => true,
        }
    }
}

/// Split `/name@bot args` into its parts.
fn parse_command(text: &str) -> Option<CommandText> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target.to_string())),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(CommandText {
        name: name.to_lowercase(),
        target,
        args: args.to_string(),
    })
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts. Never splits
/// inside a UTF-8 character.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(token: &str) -> TelegramChannel {
        TelegramChannel::new(SecretString::from(token.to_string()))
    }

    // ── Basic channel tests ─────────────────────────────────────────

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel("fake-token").name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel("123:ABC").api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_api_url_custom_base() {
        let ch = channel("123:ABC").with_api_base("http://localhost:8081");
        assert_eq!(
            ch.api_url("sendDocument"),
            "http://localhost:8081/bot123:ABC/sendDocument"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parses_start_command() {
        let update = serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": {"id": 555, "username": "john", "first_name": "John"},
                "chat": {"id": 555, "type": "private"},
                "text": "/start"
            }
        });
        let event = parse_update(&update, None).unwrap();
        assert_eq!(event.sender.user_id, 555);
        assert_eq!(event.sender.chat_id, 555);
        assert_eq!(event.sender.username.as_deref(), Some("john"));
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "start".into(),
                args: String::new()
            }
        );
    }

    #[test]
    fn command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Cancel@HitcCareersBot now please"),
            Some(CommandText {
                name: "cancel".into(),
                target: Some("HitcCareersBot".into()),
                args: "now please".into(),
            })
        );
        assert_eq!(parse_command("hello /start"), None);
        assert_eq!(parse_command("/"), None);
    }

    fn group_command(text: &str) -> Value {
        serde_json::json!({
            "update_id": 9,
            "message": {
                "message_id": 90,
                "from": {"id": 555, "username": "john"},
                "chat": {"id": -100_777, "type": "supergroup"},
                "text": text
            }
        })
    }

    #[test]
    fn commands_for_other_bots_are_dropped() {
        let me = Some("HitcCareersBot");
        assert!(parse_update(&group_command("/start@SomeOtherBot"), me).is_none());

        for text in ["/start", "/start@HitcCareersBot", "/start@hitccareersbot"] {
            let event = parse_update(&group_command(text), me).unwrap();
            assert_eq!(
                event.kind,
                EventKind::Command {
                    name: "start".into(),
                    args: String::new()
                },
                "{text}"
            );
            assert_eq!(event.sender.chat_id, -100_777);
        }
    }

    #[test]
    fn any_suffix_accepted_when_username_unknown() {
        let event = parse_update(&group_command("/cancel@SomeOtherBot"), None).unwrap();
        assert!(matches!(event.kind, EventKind::Command { ref name, .. } if name == "cancel"));
    }

    #[test]
    fn parses_plain_text() {
        let update = serde_json::json!({
            "update_id": 2,
            "message": {
                "from": {"id": 7},
                "chat": {"id": 7},
                "text": "John Smith"
            }
        });
        let event = parse_update(&update, None).unwrap();
        assert_eq!(event.kind, EventKind::Text("John Smith".into()));
        assert_eq!(event.sender.username, None);
    }

    #[test]
    fn parses_document() {
        let update = serde_json::json!({
            "update_id": 3,
            "message": {
                "from": {"id": 7},
                "chat": {"id": 7},
                "document": {
                    "file_id": "BQACAgIAAxkBAAI",
                    "file_name": "cv.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 48213
                }
            }
        });
        let event = parse_update(&update, None).unwrap();
        let EventKind::Document(doc) = event.kind else {
            panic!("expected document");
        };
        assert_eq!(doc.file_id, "BQACAgIAAxkBAAI");
        assert_eq!(doc.file_name.as_deref(), Some("cv.pdf"));
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.file_size, Some(48213));
    }

    #[test]
    fn photo_is_unsupported() {
        let update = serde_json::json!({
            "update_id": 4,
            "message": {
                "from": {"id": 7},
                "chat": {"id": 7},
                "photo": [{"file_id": "AgAC", "width": 90, "height": 90}]
            }
        });
        assert_eq!(parse_update(&update, None).unwrap().kind, EventKind::Unsupported);
    }

    #[test]
    fn parses_callback_query() {
        let update = serde_json::json!({
            "update_id": 5,
            "callback_query": {
                "id": "4382bfdwdsb323b2d9",
                "from": {"id": 7, "username": "amir"},
                "message": {"message_id": 99, "chat": {"id": 7}},
                "data": "lang_uz"
            }
        });
        let event = parse_update(&update, None).unwrap();
        assert_eq!(
            event.kind,
            EventKind::Callback {
                id: "4382bfdwdsb323b2d9".into(),
                data: "lang_uz".into(),
                message_id: Some(99),
            }
        );
    }

    #[test]
    fn callback_without_message_replies_to_user() {
        let update = serde_json::json!({
            "update_id": 6,
            "callback_query": {"id": "q", "from": {"id": 12}, "data": "lang_en"}
        });
        let event = parse_update(&update, None).unwrap();
        assert_eq!(event.sender.chat_id, 12);
    }

    #[test]
    fn ignores_edited_messages_and_senderless_updates() {
        let edited = serde_json::json!({
            "update_id": 7,
            "edited_message": {"from": {"id": 1}, "chat": {"id": 1}, "text": "x"}
        });
        assert!(parse_update(&edited, None).is_none());

        let channel_post = serde_json::json!({
            "update_id": 8,
            "message": {"chat": {"id": -100}, "text": "x"}
        });
        assert!(parse_update(&channel_post, None).is_none());
    }

    // ── Network error tests (expected to fail with no server) ───────

    #[tokio::test]
    async fn telegram_send_document_unreachable_server() {
        let ch = channel("fake-token").with_api_base("http://127.0.0.1:9");
        let result = ch.send_document(123456, "file-id", Some("caption")).await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }

    #[tokio::test]
    async fn telegram_send_error_does_not_leak_token() {
        let ch = channel("999:SECRET").with_api_base("http://127.0.0.1:9");
        let err = ch.send_text(1, "hi", None).await.unwrap_err().to_string();
        assert!(!err.contains("SECRET"), "token leaked: {err}");
    }

    /// Serve the same canned JSON response to every request on a local port.
    async fn stub_api(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_error_status_maps_to_http_error() {
        let base = stub_api(
            "401 Unauthorized",
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        )
        .await;
        let ch = channel("999:SECRET").with_api_base(base);
        match ch.send_text(1, "hi", None).await {
            Err(ChannelError::Http(msg)) => {
                assert!(msg.contains("Unauthorized"), "{msg}");
                assert!(!msg.contains("SECRET"), "token leaked: {msg}");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_call_maps_to_send_failed() {
        let base = stub_api(
            "200 OK",
            r#"{"ok":false,"description":"Bad Request: chat not found"}"#,
        )
        .await;
        let ch = channel("1:abc").with_api_base(base);
        match ch.send_document(42, "file-id", Some("caption")).await {
            Err(ChannelError::SendFailed { reason, .. }) => {
                assert!(reason.contains("chat not found"), "{reason}");
            }
            other => panic!("expected SendFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_check_learns_bot_username() {
        let base = stub_api(
            "200 OK",
            r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"Careers","username":"HitcCareersBot"}}"#,
        )
        .await;
        let ch = channel("1:abc").with_api_base(base);
        assert_eq!(ch.bot_username(), None);
        ch.health_check().await.unwrap();
        assert_eq!(ch.bot_username(), Some("HitcCareersBot"));
    }

    #[tokio::test]
    async fn health_check_rejects_bad_token() {
        let base = stub_api("401 Unauthorized", r#"{"ok":false,"description":"Unauthorized"}"#).await;
        let ch = channel("1:abc").with_api_base(base);
        assert!(matches!(
            ch.health_check().await,
            Err(ChannelError::StartupFailed { .. })
        ));
        assert_eq!(ch.bot_username(), None);
    }

    #[test]
    fn api_description_reads_error_text() {
        let body = serde_json::json!({"ok": false, "description": "Forbidden: bot was blocked"});
        assert_eq!(api_description(&body), Some("Forbidden: bot was blocked"));
        assert_eq!(api_description(&serde_json::json!({"ok": true})), None);
        assert_eq!(api_description(&Value::Null), None);
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // Cyrillic letters are two bytes each.
        let msg = "я".repeat(3000);
        let chunks = split_message(&msg, 4095);
        assert!(chunks.iter().all(|c| c.len() <= 4095));
        assert_eq!(chunks.concat(), msg);
    }
}
