// src/ingest/providers/google_news.rs
//! Google News RSS search provider.

use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::error::FetchError;
use crate::ingest::normalize_title;
use crate::ingest::types::{EntrySource, FeedSource, RawEntry};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .and_then(|dt| u64::try_from(dt.timestamp()).ok())
}

/// Absolute links inside an item's HTML description, in document order.
fn description_links(html: &str) -> Vec<String> {
    let doc = Html::parse_fragment(html);
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| h.starts_with("http://") || h.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

/// Parse an RSS document into entries. Items without title or link are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>, FetchError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = normalize_title(it.title.as_deref().unwrap_or_default());
        let link = it.link.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let source = it.source.and_then(|s| {
            let name = normalize_title(s.name.as_deref().unwrap_or_default());
            if name.is_empty() {
                None
            } else {
                Some(EntrySource { name, href: s.url })
            }
        });
        out.push(RawEntry {
            title,
            link: link.to_string(),
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
            alt_links: it
                .description
                .as_deref()
                .map(description_links)
                .unwrap_or_default(),
            source,
        });
    }
    Ok(out)
}

pub struct GoogleNewsFeed {
    client: Client,
    cfg: FeedConfig,
}

impl GoogleNewsFeed {
    pub fn new(cfg: FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; ntpc-news-digest/0.1)")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, cfg }
    }

    /// Search URL for `query`, with the recency operator appended.
    pub fn search_url(&self, query: &str) -> String {
        let q = if self.cfg.window_operator.trim().is_empty() {
            query.trim().to_string()
        } else {
            format!("{} {}", query.trim(), self.cfg.window_operator.trim())
        };
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.cfg.base_url,
            urlencoding::encode(&q),
            self.cfg.hl,
            self.cfg.gl,
            self.cfg.ceid
        )
    }
}

#[async_trait]
impl FeedSource for GoogleNewsFeed {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawEntry>, FetchError> {
        let url = self.search_url(query);
        tracing::debug!(target: "ingest", %url, "fetching feed");

        let t0 = std::time::Instant::now();
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.text().await?;
        let mut entries = parse_feed(&body)?;
        entries.truncate(limit);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("digest_fetch_ms").record(ms);
        counter!("digest_entries_fetched_total").increment(entries.len() as u64);
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "GoogleNews"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
