//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Runtime configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API access token (`BOT_TOKEN`).
    pub bot_token: SecretString,
    /// Reviewer chat that receives forwarded applications (`ADMIN_CHAT_ID`).
    /// `None` when unset or zero.
    pub reviewer_chat_id: Option<i64>,
    /// SQLite database file (`HR_BOT_DB_PATH`).
    pub db_path: PathBuf,
    /// Bot API base URL (`TELEGRAM_API_BASE`).
    pub api_base: String,
    /// Upper bound on the reviewer forward (`REVIEWER_FORWARD_TIMEOUT_SECS`).
    pub forward_timeout: Duration,
    /// Sessions idle longer than this are dropped (`SESSION_IDLE_TIMEOUT_SECS`).
    pub session_idle_timeout: Duration,
    /// Optional directory for rolling log files (`HR_BOT_LOG_DIR`).
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let reviewer_chat_id = match lookup("ADMIN_CHAT_ID").map(|s| s.trim().to_string()) {
            None => None,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => {
                let id: i64 = raw.parse().map_err(|e| ConfigError::InvalidValue {
                    key: "ADMIN_CHAT_ID".into(),
                    message: format!("{raw:?} is not an integer chat id ({e})"),
                })?;
                (id != 0).then_some(id)
            }
        };

        let db_path = lookup("HR_BOT_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./hrbot.db"));

        let api_base = lookup("TELEGRAM_API_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let forward_timeout = Duration::from_secs(parse_secs(
            &lookup,
            "REVIEWER_FORWARD_TIMEOUT_SECS",
            15,
        )?);
        let session_idle_timeout = Duration::from_secs(parse_secs(
            &lookup,
            "SESSION_IDLE_TIMEOUT_SECS",
            86_400,
        )?);

        let log_dir = lookup("HR_BOT_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            reviewer_chat_id,
            db_path,
            api_base,
            forward_timeout,
            session_idle_timeout,
            log_dir,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?} is not a positive number of seconds"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BOT_TOKEN"));
    }

    #[test]
    fn blank_token_is_fatal() {
        assert!(load(&[("BOT_TOKEN", "   ")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("BOT_TOKEN", "123:ABC")]).unwrap();
        assert_eq!(cfg.bot_token.expose_secret(), "123:ABC");
        assert_eq!(cfg.reviewer_chat_id, None);
        assert_eq!(cfg.db_path, PathBuf::from("./hrbot.db"));
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.forward_timeout, Duration::from_secs(15));
        assert_eq!(cfg.session_idle_timeout, Duration::from_secs(86_400));
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn zero_reviewer_disables_forwarding() {
        let cfg = load(&[("BOT_TOKEN", "t"), ("ADMIN_CHAT_ID", "0")]).unwrap();
        assert_eq!(cfg.reviewer_chat_id, None);
    }

    #[test]
    fn negative_group_chat_id_is_accepted() {
        let cfg = load(&[("BOT_TOKEN", "t"), ("ADMIN_CHAT_ID", "-1001234567890")]).unwrap();
        assert_eq!(cfg.reviewer_chat_id, Some(-1_001_234_567_890));
    }

    #[test]
    fn non_numeric_reviewer_is_rejected() {
        let err = load(&[("BOT_TOKEN", "t"), ("ADMIN_CHAT_ID", "hr-team")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ADMIN_CHAT_ID"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let cfg = load(&[("BOT_TOKEN", "t"), ("TELEGRAM_API_BASE", "http://localhost:8081/")]).unwrap();
        assert_eq!(cfg.api_base, "http://localhost:8081");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = load(&[("BOT_TOKEN", "t"), ("REVIEWER_FORWARD_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
