// src/config/ai.rs
use serde::{Deserialize, Serialize};

fn default_max_chars() -> usize {
    400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Master switch; with `false` every annotation is the rule-based fallback.
    pub enabled: bool,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Per-pick summaries on top of the per-category recommendation.
    pub annotate_picks: bool,
    /// Cap on annotation length (chars) after whitespace cleanup.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1".to_string(),
            timeout_secs: 10,
            annotate_picks: true,
            max_chars: default_max_chars(),
        }
    }
}

impl AiConfig {
    /// `generateContent` endpoint for the configured model (key passed separately).
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}
