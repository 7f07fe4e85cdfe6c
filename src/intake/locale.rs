//! Localized message catalog.
//!
//! Every user-facing string lives here, keyed by `(Language, MessageKey)`.
//! The catalog is built once at startup and never mutated.

use std::collections::HashMap;

use crate::channels::InlineKeyboard;

use super::model::Language;
use super::model::Language::{En, Ru, Uz};
use self::MessageKey::{
    AskCv, AskName, AskPhone, AskPosition, BadCv, BadPhone, Cancelled, ChangeLanguage,
    ChooseLanguage, SubmitFailed, Thanks,
};

/// Banner shown before the applicant has picked a language, in all three.
pub const WELCOME_BANNER: &str = "\
🇷🇺 Добро пожаловать! Станьте частью нашей международной команды в Holiday Inn Tashkent City.\n\n\
🇬🇧 Welcome! Join our international team at Holiday Inn Tashkent City.\n\n\
🇺🇿 Xush kelibsiz! Holiday Inn Tashkent City’dagi xalqaro jamoamizga qo‘shiling.";

/// Identifies a localized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    ChooseLanguage,
    AskName,
    AskPhone,
    BadPhone,
    AskPosition,
    AskCv,
    BadCv,
    Thanks,
    ChangeLanguage,
    Cancelled,
    SubmitFailed,
}

impl MessageKey {
    pub const ALL: [MessageKey; 11] = [
        MessageKey::ChooseLanguage,
        MessageKey::AskName,
        MessageKey::AskPhone,
        MessageKey::BadPhone,
        MessageKey::AskPosition,
        MessageKey::AskCv,
        MessageKey::BadCv,
        MessageKey::Thanks,
        MessageKey::ChangeLanguage,
        MessageKey::Cancelled,
        MessageKey::SubmitFailed,
    ];
}

static ENTRIES: &[(Language, MessageKey, &str)] = &[
    // ── English ─────────────────────────────────────────────────────
    (En, ChooseLanguage, "Please choose your language:"),
    (En, AskName, "Please enter your full name (e.g., John Smith)."),
    (En, AskPhone, "Send your phone number in international format (e.g., +9989X xxx xx xx)."),
    (En, BadPhone, "This number looks invalid. Use format +9989X xxx xx xx."),
    (En, AskPosition, "Which position are you applying for? (e.g., Front Desk Agent, Waiter)."),
    (En, AskCv, "Upload your CV as a PDF/DOC/DOCX file (max 20 MB). Photos are not accepted."),
    (En, BadCv, "Please send a document file (PDF/DOC/DOCX) up to 20 MB (no images)."),
    (
        En,
        Thanks,
        "Thank you! Your CV has been received successfully.\n\
         The HR Department of Holiday Inn Tashkent City will carefully review your application.\n\
         If your profile matches an open vacancy, we will contact you.\n\
         We appreciate your interest and patience.",
    ),
    (En, ChangeLanguage, "Choose a language:"),
    (En, Cancelled, "Cancelled. Send /start to begin again."),
    (En, SubmitFailed, "Sorry, we could not save your application. Please send your CV again in a moment."),
    // ── Russian ─────────────────────────────────────────────────────
    (Ru, ChooseLanguage, "Пожалуйста, выберите язык:"),
    (Ru, AskName, "Введите ваше ФИО (например: Иванов Иван Иванович)."),
    (Ru, AskPhone, "Укажите номер телефона в международном формате (например: +9989X xxx xx xx)."),
    (Ru, BadPhone, "Похоже, номер некорректный. Используйте формат +9989X xxx xx xx."),
    (Ru, AskPosition, "На какую позицию вы хотите откликнуться? (например: Front Desk Agent, Официант)."),
    (Ru, AskCv, "Загрузите резюме как документ в формате PDF/DOC/DOCX (до 20 МБ). Фото не принимаются."),
    (Ru, BadCv, "Нужен файл-документ (PDF/DOC/DOCX) до 20 МБ (не изображение)."),
    (
        Ru,
        Thanks,
        "Спасибо! Ваше резюме успешно получено.\n\
         HR-отдел Holiday Inn Tashkent City рассмотрит вашу заявку.\n\
         Если ваш профиль будет соответствовать открытой вакансии, мы обязательно свяжемся.\n\
         Благодарим за интерес и терпение.",
    ),
    (Ru, ChangeLanguage, "Выберите язык:"),
    (Ru, Cancelled, "Отменено. Отправьте /start, чтобы начать заново."),
    (Ru, SubmitFailed, "Не удалось сохранить вашу заявку. Пожалуйста, отправьте резюме ещё раз чуть позже."),
    // ── Uzbek ───────────────────────────────────────────────────────
    (Uz, ChooseLanguage, "Iltimos, tilni tanlang:"),
    (Uz, AskName, "Iltimos, to‘liq ismingizni kiriting (masalan: Aliyev Ali)."),
    (Uz, AskPhone, "Telefon raqamingizni xalqaro formatda yuboring (masalan: +9989X xxx xx xx)."),
    (Uz, BadPhone, "Raqam noto‘g‘ri ko‘rinadi. +9989X xxx xx xx kabi formatdan foydalaning."),
    (Uz, AskPosition, "Qaysi lavozimga murojaat qilyapsiz? (masalan: Front Desk Agent, Waiter)."),
    (Uz, AskCv, "Rezyumeyingizni PDF/DOC/DOCX hujjat sifatida yuboring (maks. 20 MB). Rasm qabul qilinmaydi."),
    (Uz, BadCv, "Faqat hujjat fayli kerak (PDF/DOC/DOCX), 20 MB gacha (rasm emas)."),
    (
        Uz,
        Thanks,
        "Rahmat! Sizning rezyumeyingiz muvaffaqiyatli qabul qilindi.\n\
         Holiday Inn Tashkent City HR bo‘limi arizangizni diqqat bilan ko‘rib chiqadi.\n\
         Profilingiz ochiq bo‘sh ish o‘rinlariga mos kelsa, biz albatta bog‘lanamiz.\n\
         Kompaniyamizga bo‘lgan qiziqishingiz va sabringiz uchun rahmat.",
    ),
    (Uz, ChangeLanguage, "Tilni tanlang:"),
    (Uz, Cancelled, "Bekor qilindi. Qaytadan boshlash uchun /start yuboring."),
    (Uz, SubmitFailed, "Arizangizni saqlab bo‘lmadi. Iltimos, birozdan so‘ng rezyumeni qayta yuboring."),
];

/// Immutable `(Language, MessageKey)` → text lookup.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<(Language, MessageKey), &'static str>,
}

impl Catalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        let entries = ENTRIES
            .iter()
            .map(|(lang, key, text)| ((*lang, *key), *text))
            .collect();
        Self { entries }
    }

    /// Look up a message. Falls back to English if a translation is missing.
    pub fn get(&self, lang: Language, key: MessageKey) -> &'static str {
        self.entries
            .get(&(lang, key))
            .or_else(|| self.entries.get(&(Language::En, key)))
            .copied()
            .unwrap_or_default()
    }

    /// Greeting sent on `/start`: the trilingual banner plus the picker prompt.
    pub fn welcome(&self) -> String {
        format!(
            "{WELCOME_BANNER}\n\n{}",
            self.get(Language::default(), MessageKey::ChooseLanguage)
        )
    }

    /// Picker prompt for an applicant whose language is still unknown.
    pub fn choose_language_all(&self) -> String {
        Language::ALL
            .iter()
            .map(|lang| self.get(*lang, MessageKey::ChangeLanguage))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Inline keyboard with one button per supported language.
pub fn language_keyboard() -> InlineKeyboard {
    InlineKeyboard::single_column(
        Language::ALL
            .iter()
            .map(|lang| (lang.label(), lang.callback_data())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_every_key() {
        let catalog = Catalog::builtin();
        for lang in Language::ALL {
            for key in MessageKey::ALL {
                assert!(
                    catalog.entries.contains_key(&(lang, key)),
                    "missing {key:?} for {lang}"
                );
                assert!(!catalog.get(lang, key).is_empty());
            }
        }
        assert_eq!(ENTRIES.len(), Language::ALL.len() * MessageKey::ALL.len());
    }

    #[test]
    fn lookups_are_language_specific() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.get(Language::En, MessageKey::ChooseLanguage),
            "Please choose your language:"
        );
        assert_eq!(
            catalog.get(Language::Ru, MessageKey::ChooseLanguage),
            "Пожалуйста, выберите язык:"
        );
        assert_eq!(
            catalog.get(Language::Uz, MessageKey::ChooseLanguage),
            "Iltimos, tilni tanlang:"
        );
    }

    #[test]
    fn welcome_contains_all_three_greetings() {
        let welcome = Catalog::builtin().welcome();
        assert!(welcome.contains("Добро пожаловать"));
        assert!(welcome.contains("Welcome!"));
        assert!(welcome.contains("Xush kelibsiz"));
        assert!(welcome.ends_with("Пожалуйста, выберите язык:"));
    }

    #[test]
    fn keyboard_offers_three_languages() {
        let kb = language_keyboard();
        let data: Vec<&str> = kb
            .rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect();
        assert_eq!(data, vec!["lang_en", "lang_ru", "lang_uz"]);
    }
}
