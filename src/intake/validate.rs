//! Field validators for the intake flow.

use std::sync::LazyLock;

use regex::Regex;

use crate::channels::DocumentUpload;

/// Largest CV the bot accepts, in bytes.
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Content types accepted as a CV: PDF, legacy Word, modern Word XML.
pub const ACCEPTED_DOCUMENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("phone regex is valid"));

/// One Unicode decimal digit (general category Nd), any script.
static DECIMAL_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d$").expect("digit regex is valid"));

/// Why an applicant's input was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("phone number {0:?} is not 7-15 digits with an optional leading +")]
    InvalidPhone(String),

    #[error("document type {0:?} is not accepted")]
    UnsupportedDocumentType(Option<String>),

    #[error("document is {size} bytes, limit is {limit}")]
    DocumentTooLarge { size: u64, limit: u64 },
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT_RE.is_match(c.encode_utf8(&mut buf))
}

/// ASCII form of a decimal digit from any script, e.g. `'٧'` → `'7'`.
///
/// Unicode lays every decimal digit set out as contiguous runs of 0 through
/// 9, so a digit's value is its distance from the start of its run, mod 10.
fn ascii_digit(c: char) -> Option<char> {
    if c.is_ascii_digit() {
        return Some(c);
    }
    if !is_decimal_digit(c) {
        return None;
    }
    let mut start = c as u32;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        start -= 1;
    }
    char::from_digit((c as u32 - start) % 10, 10)
}

/// Strip all whitespace from a phone number as typed by the applicant and
/// write digits from any script as ASCII.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| ascii_digit(c).unwrap_or(c))
        .collect()
}

/// Normalize and validate a phone number. Returns the normalized form.
pub fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    let phone = normalize_phone(raw);
    if PHONE_RE.is_match(&phone) {
        Ok(phone)
    } else {
        Err(ValidationError::InvalidPhone(phone))
    }
}

/// Accept a CV upload iff its declared type is a PDF or Word document and it
/// fits the size limit. A missing size counts as zero.
pub fn validate_document(doc: &DocumentUpload) -> Result<(), ValidationError> {
    let accepted = doc
        .mime_type
        .as_deref()
        .is_some_and(|mime| ACCEPTED_DOCUMENT_TYPES.contains(&mime));
    if !accepted {
        return Err(ValidationError::UnsupportedDocumentType(doc.mime_type.clone()));
    }

    let size = doc.file_size.unwrap_or(0);
    if size > MAX_DOCUMENT_BYTES {
        return Err(ValidationError::DocumentTooLarge {
            size,
            limit: MAX_DOCUMENT_BYTES,
        });
    }

    Ok(())
}
