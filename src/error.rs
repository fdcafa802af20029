//! Error kinds for every external call the bot makes.
//!
//! Each stage returns one of these and the caller decides how to degrade
//! (empty list, original URL, fallback text). Nothing here aborts a run except
//! `ConfigError` at startup.

use thiserror::Error;

/// Feed provider failures (network, status, XML).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Request(String),

    #[error("feed returned status {status}")]
    Status { status: u16 },

    #[error("feed parse error: {0}")]
    Parse(String),
}

/// Redirect-chasing failures. Always absorbed by the resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolve request failed: {0}")]
    Request(String),

    #[error("resolve body read failed: {0}")]
    Body(String),
}

/// AI annotator failures.
#[derive(Debug, Error)]
pub enum AiError {
    /// No credential configured; the call is never attempted.
    #[error("AI annotator not configured")]
    NotConfigured,

    #[error("AI request timed out")]
    Timeout,

    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("AI returned an empty answer")]
    Empty,
}

/// Chat transport failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(String),

    #[error("delivery rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Persisted cache failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Startup configuration failures; fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret {0}")]
    MissingSecret(&'static str),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e.to_string())
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else {
            // the request URL carries the API key
            AiError::Request(e.without_url().to_string())
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        // the request URL carries the bot token
        DeliveryError::Request(e.without_url().to_string())
    }
}

/// Shorten a diagnostic for logs (char-safe).
pub fn truncate_diag<T: ToString>(e: &T, max: usize) -> String {
    let s = e.to_string();
    if s.chars().count() <= max {
        return s;
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
