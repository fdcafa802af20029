//! AI adapter: provider abstraction over a single text-completion call.
//! One attempt per prompt, bounded by a timeout; no retries, no caching.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::{truncate_diag, AiError};

pub type AiFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>>;

/// Trait object used by the annotator (and replaced by fakes in tests).
pub trait AiClient: Send + Sync {
    /// Complete `prompt`; the answer is raw model text.
    fn complete<'a>(&'a self, prompt: &'a str) -> AiFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

/// Factory: a disabled client when AI is switched off or no key is configured,
/// otherwise the Gemini client.
pub fn build_ai_client(cfg: &AiConfig, api_key: Option<&str>) -> DynAiClient {
    match api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) if cfg.enabled => Arc::new(GeminiClient::new(cfg, key.to_string())),
        _ => Arc::new(DisabledClient),
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig, api_key: String) -> Self {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .user_agent("ntpc-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_key,
            endpoint: cfg.endpoint(),
            timeout,
        }
    }

    async fn call(&self, prompt: &str) -> Result<String, AiError> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
        }

        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;
        let parsed = serde_json::from_str::<GeminiResponse>(&raw);
        if !status.is_success() {
            let message = match parsed {
                Ok(GeminiResponse {
                    error: Some(err), ..
                }) => err.message,
                _ => truncate_diag(&raw, 200),
            };
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = parsed.map_err(|e| AiError::Request(truncate_diag(&e, 200)))?;
        body.first_text().ok_or(AiError::Empty)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GeminiResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

impl AiClient for GeminiClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> AiFuture<'a> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.call(prompt)).await {
                Ok(res) => res,
                Err(_) => Err(AiError::Timeout),
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Never calls out; used when AI is disabled or unconfigured.
pub struct DisabledClient;

impl AiClient for DisabledClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> AiFuture<'a> {
        Box::pin(async { Err(AiError::NotConfigured) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic client for tests/local runs.
#[derive(Clone)]
pub struct MockClient {
    pub fixed: String,
}

impl AiClient for MockClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> AiFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Single line, collapsed whitespace, markdown emphasis removed, at most `max_chars`.
pub fn sanitize_annotation(input: &str, max_chars: usize) -> String {
    let cleaned = input.replace("**", "").replace("__", "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars).collect();
    out.push('…');
    out
}
