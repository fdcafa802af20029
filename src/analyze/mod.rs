// src/analyze/mod.rs
//! Annotation layer: AI summaries for picks and a per-category recommendation,
//! with the category's rule-based sentence as the fallback.

pub mod ai_adapter;

use metrics::counter;
use serde::Serialize;

use crate::config::AiConfig;
use crate::error::{truncate_diag, AiError};

pub use crate::analyze::ai_adapter::{
    build_ai_client, sanitize_annotation, AiClient, DisabledClient, DynAiClient, GeminiClient,
    MockClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnnotationOrigin {
    Ai,
    RuleBased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub text: String,
    pub origin: AnnotationOrigin,
}

impl Annotation {
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: AnnotationOrigin::Ai,
        }
    }

    pub fn rule_based(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: AnnotationOrigin::RuleBased,
        }
    }

    pub fn is_ai(&self) -> bool {
        self.origin == AnnotationOrigin::Ai
    }
}

/// Per-pick summary prompt.
pub fn pick_prompt(title: &str) -> String {
    format!(
        "你是新北市政府教育局的業務主管。請閱讀以下新聞標題，\
         以兩句話摘要重點，並提出一項具體的行政建議。\
         若新聞發生在新北市以外的縣市，請分析其對新北市的參考價值。\
         請使用繁體中文回答，不要使用條列或標題。\n\n新聞標題：{title}"
    )
}

/// Per-category recommendation prompt over the picked titles.
pub fn category_prompt(label: &str, titles: &[&str]) -> String {
    let list = titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {t}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "你是新北市政府教育局的業務主管，負責「{label}」業務。\
         以下是今日與此業務相關的新聞標題：\n{list}\n\n\
         請綜合上述新聞，以一至兩句話提出新北市教育局今日應採取的行政建議。\
         請使用繁體中文回答。"
    )
}

/// Wraps an AI client; every call degrades to the given fallback.
pub struct Annotator {
    client: DynAiClient,
    max_chars: usize,
    annotate_picks: bool,
}

impl Annotator {
    pub fn new(client: DynAiClient, cfg: &AiConfig) -> Self {
        Self {
            client,
            max_chars: cfg.max_chars.max(16),
            annotate_picks: cfg.annotate_picks,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Summary for one pick, or `None` when pick annotation is off or the call failed.
    pub async fn annotate_pick(&self, title: &str) -> Option<Annotation> {
        if !self.annotate_picks {
            return None;
        }
        let prompt = pick_prompt(title);
        match self.complete(&prompt).await {
            Ok(text) => Some(Annotation::ai(text)),
            Err(e) => {
                log_fallback("pick", &e);
                None
            }
        }
    }

    /// Category recommendation; `fallback` when there is nothing to ask about or the call failed.
    pub async fn recommend(&self, label: &str, titles: &[&str], fallback: &str) -> Annotation {
        if titles.is_empty() {
            return Annotation::rule_based(fallback);
        }
        let prompt = category_prompt(label, titles);
        match self.complete(&prompt).await {
            Ok(text) => Annotation::ai(text),
            Err(e) => {
                log_fallback(label, &e);
                Annotation::rule_based(fallback)
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let raw = self.client.complete(prompt).await?;
        let text = sanitize_annotation(&raw, self.max_chars);
        if text.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(text)
    }
}

fn log_fallback(scope: &str, e: &AiError) {
    counter!("digest_ai_fallbacks_total").increment(1);
    match e {
        AiError::NotConfigured => {
            tracing::debug!(target: "ai", scope, "ai not configured, using fallback")
        }
        other => tracing::warn!(
            target: "ai",
            scope,
            error = %truncate_diag(other, 160),
            "ai call failed, using fallback"
        ),
    }
}
