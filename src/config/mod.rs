// src/config/mod.rs
//! Run configuration: every keyword list, cap and timeout the pipeline stages
//! need, passed explicitly into each stage. Secrets live in `secrets`.

pub mod ai;
pub mod secrets;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use ai::AiConfig;
pub use secrets::Secrets;

pub const ENV_CONFIG_PATH: &str = "NEWSBOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

/// Smallest transport limit we accept; below this the part markers do not fit.
const MIN_MESSAGE_LIMIT: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub feed: FeedConfig,
    pub resolver: ResolverConfig,
    pub filter: FilterConfig,
    pub dedup: DedupConfig,
    pub cache: CacheConfig,
    pub ranking: RankingConfig,
    pub report: ReportConfig,
    pub notify: NotifyConfig,
    pub ai: AiConfig,
    pub categories: Vec<CategoryConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            resolver: ResolverConfig::default(),
            filter: FilterConfig::default(),
            dedup: DedupConfig::default(),
            cache: CacheConfig::default(),
            ranking: RankingConfig::default(),
            report: ReportConfig::default(),
            notify: NotifyConfig::default(),
            ai: AiConfig::default(),
            categories: default_categories(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub hl: String,
    pub gl: String,
    pub ceid: String,
    /// Search operator appended to every query, e.g. `when:1d`. Empty disables it.
    pub window_operator: String,
    pub per_query_limit: usize,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://news.google.com/rss/search".to_string(),
            hl: "zh-TW".to_string(),
            gl: "TW".to_string(),
            ceid: "TW:zh-Hant".to_string(),
            window_operator: "when:1d".to_string(),
            per_query_limit: 10,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// When false, canonical URL = original link (no network).
    pub enabled: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub aggregator_host: String,
    /// Hosts (and their subdomains) that belong to the aggregator or its sub-services.
    pub aggregator_domains: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 8,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            aggregator_host: "news.google.com".to_string(),
            aggregator_domains: strings(&[
                "google.com",
                "google.com.tw",
                "gstatic.com",
                "googleusercontent.com",
                "googleapis.com",
                "googletagmanager.com",
                "doubleclick.net",
            ]),
        }
    }
}

impl ResolverConfig {
    /// True when `host` is the aggregator or one of its sub-services.
    pub fn is_aggregator_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host == self.aggregator_host {
            return true;
        }
        self.aggregator_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub recency_window_hours: u64,
    /// Title keywords connoting follow-up coverage; such entries pass even when stale.
    pub update_signals: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            recency_window_hours: 24,
            update_signals: strings(&[
                "最新", "更新", "再度", "再次", "重啟", "再開罰", "再罰", "重罰", "加重處罰", "搜索",
                "搜查", "突襲", "稽查", "查獲", "續報",
            ]),
        }
    }
}

impl FilterConfig {
    pub fn recency_window_secs(&self) -> u64 {
        self.recency_window_hours.saturating_mul(3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Outlet names stripped from a trailing `- Outlet` title suffix.
    pub outlet_suffixes: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            outlet_suffixes: strings(&[
                "Yahoo奇摩新聞",
                "Yahoo新聞",
                "聯合新聞網",
                "中時新聞網",
                "自由時報",
                "自由時報電子報",
                "ETtoday新聞雲",
                "ETtoday",
                "三立新聞網",
                "TVBS新聞網",
                "中央社",
                "中央社 CNA",
                "NOWnews今日新聞",
                "鏡週刊",
                "工商時報",
                "經濟日報",
                "民視新聞網",
                "公視新聞網",
                "風傳媒",
                "新頭殼",
                "台視新聞網",
                "華視新聞網",
                "中天新聞網",
                "東森新聞",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/sent_cache.json"),
            ttl_days: 5,
        }
    }
}

impl CacheConfig {
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_days.saturating_mul(86_400)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Place and official names marking an entry as locality-related.
    pub gazetteer: Vec<String>,
    pub locality_cap: usize,
    pub other_cap: usize,
    /// A bucket holding fewer picks than this pulls from the other side's overflow.
    pub min_fill: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            gazetteer: strings(&[
                "新北", "新北市", "侯友宜", "板橋", "三重", "中和", "永和", "新莊", "新店", "土城",
                "蘆洲", "汐止", "樹林", "鶯歌", "三峽", "淡水", "瑞芳", "五股", "泰山", "林口",
                "深坑", "石碇", "坪林", "三芝", "石門", "八里", "平溪", "雙溪", "貢寮", "金山",
                "萬里", "烏來",
            ]),
            locality_cap: 3,
            other_cap: 2,
            min_fill: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Transport message limit, in characters.
    pub message_limit: usize,
    /// Offset used for the report date line.
    pub utc_offset_hours: i32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "教育輿情報告（新北核心＋全國動態）".to_string(),
            message_limit: 4096,
            utc_offset_hours: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    /// Fixed pause between successive chunk sends.
    pub pause_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
            pause_ms: 1_000,
        }
    }
}

/// Category-specific relevance rule: at least one `must_include` term (if any
/// are listed) and no `exclude` term.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelevanceRule {
    pub must_include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    pub label: String,
    pub local_query: String,
    pub national_query: String,
    #[serde(default)]
    pub rule: Option<RelevanceRule>,
    /// Rule-based administrative recommendation used whenever AI text is unavailable.
    pub fallback: String,
}

pub fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            label: "交通安全".to_string(),
            local_query: "新北 交通安全".to_string(),
            national_query: "台灣 交通新制".to_string(),
            rule: Some(RelevanceRule {
                must_include: Vec::new(),
                exclude: strings(&[
                    "家暴", "墜樓", "火警", "火災", "一氧化碳", "溺水", "輕生", "命案", "詐騙",
                ]),
            }),
            fallback: "建議持續關注交通新制宣導，結合校園交通安全教育，強化學童上下學路線安全。"
                .to_string(),
        },
        CategoryConfig {
            label: "補習班業務".to_string(),
            local_query: "新北 補習班".to_string(),
            national_query: "台灣 補教法規".to_string(),
            rule: Some(RelevanceRule {
                must_include: strings(&[
                    "補習班", "補教", "短期補習", "課照", "兒童課後照顧", "補習",
                ]),
                exclude: strings(&[
                    "警方", "員警", "警察局", "通緝", "職棒", "球賽", "演唱會", "藝人", "綜藝",
                ]),
            }),
            fallback: "建議持續督導轄內補習班立案與公共安全稽查，並加強消費者權益宣導。"
                .to_string(),
        },
        CategoryConfig {
            label: "終身學習".to_string(),
            local_query: "新北 終身學習".to_string(),
            national_query: "台灣 社區大學".to_string(),
            rule: None,
            fallback: "建議盤點社區大學與樂齡學習資源，擴大終身學習課程的在地參與。".to_string(),
        },
    ]
}

impl BotConfig {
    /// Load from an explicit TOML path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing bot config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWSBOT_CONFIG_PATH
    /// 2) config/bot.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default().sanitized())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BotConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    /// Clamp values the pipeline cannot work with.
    fn sanitized(mut self) -> Self {
        if self.report.message_limit < MIN_MESSAGE_LIMIT {
            self.report.message_limit = MIN_MESSAGE_LIMIT;
        }
        if self.feed.per_query_limit == 0 {
            self.feed.per_query_limit = FeedConfig::default().per_query_limit;
        }
        if self.cache.ttl_days == 0 {
            self.cache.ttl_days = CacheConfig::default().ttl_days;
        }
        self.resolver.aggregator_host = self.resolver.aggregator_host.to_ascii_lowercase();
        for d in self.resolver.aggregator_domains.iter_mut() {
            *d = d.trim().trim_start_matches('.').to_ascii_lowercase();
        }
        self.categories.retain(|c| !c.label.trim().is_empty());
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
