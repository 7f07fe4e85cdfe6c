//! Application data model.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::{ChatId, DocumentUpload, UserId};

/// Languages the bot can talk in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
    Uz,
}

impl Language {
    /// All supported languages, in picker order.
    pub const ALL: [Language; 3] = [Language::En, Language::Ru, Language::Uz];

    /// Prefix of the language picker's callback data.
    pub const CALLBACK_PREFIX: &'static str = "lang_";

    /// ISO 639-1 code stored in the database.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
            Self::Uz => "uz",
        }
    }

    /// Button label, written in the language itself.
    pub fn label(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ru => "Русский",
            Self::Uz => "O‘zbekcha",
        }
    }

    /// Callback data carried by this language's picker button.
    pub fn callback_data(&self) -> String {
        format!("{}{}", Self::CALLBACK_PREFIX, self.code())
    }

    /// Decode picker callback data such as `lang_en`.
    pub fn from_callback(data: &str) -> Option<Self> {
        data.strip_prefix(Self::CALLBACK_PREFIX)?.parse().ok()
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::Ru
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "ru" => Ok(Self::Ru),
            "uz" => Ok(Self::Uz),
            other => Err(format!("unsupported language code: {other}")),
        }
    }
}

/// A fully validated submission, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub language: Language,
    pub full_name: String,
    pub phone: String,
    pub position: String,
    pub document: DocumentUpload,
}

/// Longest caption Telegram accepts on a document, in characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

impl NewApplication {
    /// Caption attached to the CV when it is relayed to the reviewer.
    ///
    /// Never longer than [`MAX_CAPTION_CHARS`]: an overlong name and position
    /// are shortened with an ellipsis, the shorter one keeping as much as fits.
    pub fn reviewer_caption(&self) -> String {
        let full = self.caption_with(&self.full_name, &self.position);
        if full.chars().count() <= MAX_CAPTION_CHARS {
            return full;
        }

        let budget = MAX_CAPTION_CHARS.saturating_sub(self.caption_with("", "").chars().count());
        let name_len = self.full_name.chars().count();
        let position_len = self.position.chars().count();
        let half = budget / 2;
        let (name_max, position_max) = if name_len <= half {
            (name_len, budget - name_len)
        } else if position_len <= budget - half {
            (budget - position_len, position_len)
        } else {
            (half, budget - half)
        };

        self.caption_with(
            &truncate_chars(&self.full_name, name_max),
            &truncate_chars(&self.position, position_max),
        )
    }

    fn caption_with(&self, full_name: &str, position: &str) -> String {
        format!(
            "📥 New application\n\
             Lang: {}\n\
             Name: {}\n\
             Phone: {}\n\
             Position: {}\n\
             TG: @{} (id {})",
            self.language,
            full_name,
            self.phone,
            position,
            self.username.as_deref().unwrap_or("—"),
            self.user_id,
        )
    }
}

/// Cut `text` to at most `max` characters, ending in `…` when shortened.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max - 1).collect();
    cut.push('…');
    cut
}

/// A stored application row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub id: i64,
    pub user_id: UserId,
    pub language: Language,
    pub full_name: String,
    pub phone: String,
    pub position: String,
    /// Transport file handle of the CV.
    pub cv_file_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_callback(&lang.callback_data()), Some(lang));
        }
    }

    #[test]
    fn unknown_callbacks_are_rejected() {
        assert_eq!(Language::from_callback("lang_de"), None);
        assert_eq!(Language::from_callback("en"), None);
        assert_eq!(Language::from_callback("lang_"), None);
        assert_eq!(Language::from_callback("something_else"), None);
    }

    #[test]
    fn display_matches_serde() {
        for lang in Language::ALL {
            let json = serde_json::to_string(&lang).unwrap();
            assert_eq!(format!("\"{lang}\""), json);
        }
    }

    #[test]
    fn caption_includes_username_or_dash() {
        let mut app = NewApplication {
            user_id: 42,
            chat_id: 42,
            username: Some("jsmith".into()),
            language: Language::En,
            full_name: "John Smith".into(),
            phone: "+998901234567".into(),
            position: "Waiter".into(),
            document: DocumentUpload::new("file-1"),
        };
        let caption = app.reviewer_caption();
        assert!(caption.starts_with("📥 New application\n"));
        assert!(caption.contains("Lang: en\n"));
        assert!(caption.contains("Name: John Smith\n"));
        assert!(caption.contains("Phone: +998901234567\n"));
        assert!(caption.contains("Position: Waiter\n"));
        assert!(caption.ends_with("TG: @jsmith (id 42)"));

        app.username = None;
        assert!(app.reviewer_caption().ends_with("TG: @— (id 42)"));
    }

    fn application_named(full_name: String, position: String) -> NewApplication {
        NewApplication {
            user_id: 42,
            chat_id: 42,
            username: Some("jsmith".into()),
            language: Language::Ru,
            full_name,
            phone: "+998901234567".into(),
            position,
            document: DocumentUpload::new("file-1"),
        }
    }

    #[test]
    fn long_fields_are_shortened_to_caption_limit() {
        let app = application_named("Я".repeat(600), "w".repeat(600));
        let caption = app.reviewer_caption();
        assert_eq!(caption.chars().count(), MAX_CAPTION_CHARS);
        assert!(caption.contains("…\nPhone: +998901234567\n"));
        assert!(caption.contains("…\nTG: @jsmith (id 42)"));
        assert!(caption.starts_with("📥 New application\nLang: ru\nName: ЯЯЯ"));
    }

    #[test]
    fn short_field_kept_whole_when_other_is_long() {
        let app = application_named("John Smith".into(), "Chef ".repeat(400));
        let caption = app.reviewer_caption();
        assert!(caption.chars().count() <= MAX_CAPTION_CHARS);
        assert!(caption.contains("Name: John Smith\n"));
        assert!(caption.contains("…\nTG: @jsmith (id 42)"));
    }

    #[test]
    fn caption_at_limit_is_untouched() {
        let fixed = application_named(String::new(), String::new())
            .reviewer_caption()
            .chars()
            .count();
        let app = application_named("n".repeat(MAX_CAPTION_CHARS - fixed - 6), "Waiter".into());
        let caption = app.reviewer_caption();
        assert_eq!(caption.chars().count(), MAX_CAPTION_CHARS);
        assert!(!caption.contains('…'));
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("Иван", 10), "Иван");
        assert_eq!(truncate_chars("Иван", 4), "Иван");
        assert_eq!(truncate_chars("Иван Петров", 5), "Иван…");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
