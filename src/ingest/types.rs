// src/ingest/types.rs
use crate::error::FetchError;

/// Publisher named by the feed, e.g. `<source url="https://udn.com">聯合新聞網</source>`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EntrySource {
    pub name: String,
    pub href: Option<String>,
}

/// One feed entry as returned by the search provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,             // often an aggregator redirector
    pub published_at: Option<u64>, // unix seconds
    pub alt_links: Vec<String>,
    pub source: Option<EntrySource>,
}

impl RawEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
            alt_links: Vec::new(),
            source: None,
        }
    }

    pub fn published(mut self, ts: u64) -> Self {
        self.published_at = Some(ts);
        self
    }

    pub fn with_source(mut self, name: impl Into<String>, href: Option<&str>) -> Self {
        self.source = Some(EntrySource {
            name: name.into(),
            href: href.map(str::to_string),
        });
        self
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name.as_str())
    }
}

/// Entry plus its canonical (publisher-hosted, best effort) URL.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub entry: RawEntry,
    pub canonical_url: String,
}

impl ResolvedEntry {
    pub fn title(&self) -> &str {
        &self.entry.title
    }

    pub fn source_name(&self) -> Option<&str> {
        self.entry.source_name()
    }
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Run one search query and return at most `limit` entries.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawEntry>, FetchError>;
    fn name(&self) -> &'static str;
}
