// src/config/secrets.rs
//! Credentials read from the process environment (`.env` honoured by `main`).

use std::fmt;

use crate::error::ConfigError;

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[derive(Clone)]
pub struct Secrets {
    pub telegram_token: String,
    pub telegram_chat_id: String,
    /// Optional; absence degrades AI annotation to the rule-based fallback.
    pub gemini_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let telegram_token =
            get(ENV_TELEGRAM_TOKEN).ok_or(ConfigError::MissingSecret(ENV_TELEGRAM_TOKEN))?;
        let telegram_chat_id =
            get(ENV_TELEGRAM_CHAT_ID).ok_or(ConfigError::MissingSecret(ENV_TELEGRAM_CHAT_ID))?;
        Ok(Self {
            telegram_token,
            telegram_chat_id,
            gemini_api_key: get(ENV_GEMINI_API_KEY),
        })
    }
}

// Only lengths, never values.
impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_token_len", &self.telegram_token.len())
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field(
                "gemini_key_len",
                &self.gemini_api_key.as_ref().map(|k| k.len()),
            )
            .finish()
    }
}
