//! Canonical URL resolution.
//!
//! Aggregator links (`news.google.com/rss/articles/...`) are chased through
//! redirects; if the final page is still on the aggregator, the publisher link
//! is pulled out of the body. Resolution never fails to the caller: any error
//! yields the original link.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{truncate_diag, ResolveError};
use crate::ingest::types::{RawEntry, ResolvedEntry};

#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Best-effort canonical URL for `url`; returns `url` itself on any failure.
    async fn resolve(&self, url: &str) -> String;
}

/// Parsed absolute http(s) URL whose host is outside the aggregator.
fn external_url(cfg: &ResolverConfig, raw: &str) -> Option<Url> {
    let u = Url::parse(raw.trim()).ok()?;
    if !matches!(u.scheme(), "http" | "https") {
        return None;
    }
    let host = u.host_str()?;
    if cfg.is_aggregator_host(host) {
        None
    } else {
        Some(u)
    }
}

/// True when `raw` is an absolute link to a publisher (non-aggregator) host.
pub fn is_external(cfg: &ResolverConfig, raw: &str) -> bool {
    external_url(cfg, raw).is_some()
}

/// Drop the fragment and `utm_*` tracking parameters.
pub fn tidy_url(raw: &str) -> String {
    let Ok(mut u) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };
    u.set_fragment(None);
    let total = u.query_pairs().count();
    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // Re-serialize only when something was dropped, so untouched queries keep their encoding.
    if kept.len() != total {
        if kept.is_empty() {
            u.set_query(None);
        } else {
            u.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    u.to_string()
}

/// First absolute `href` (any element, document order) pointing outside the aggregator.
pub fn first_external_href(cfg: &ResolverConfig, body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("[href]").ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| external_url(cfg, href))
        .map(|u| u.to_string())
}

/// First `url=` parameter anywhere in the body that decodes to a publisher link.
pub fn url_param_in_body(cfg: &ResolverConfig, body: &str) -> Option<String> {
    static RE_URL_PARAM: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL_PARAM
        .get_or_init(|| Regex::new(r#"(?i)url=([^&"'\s<>;]+)"#).expect("url param regex"));
    re.captures_iter(body)
        .filter_map(|c| c.get(1))
        .filter_map(|m| urlencoding::decode(m.as_str()).ok())
        .find_map(|decoded| external_url(cfg, &decoded))
        .map(|u| u.to_string())
}

/// Pure step: given where the redirects ended and the page body, pick the canonical URL.
pub fn canonicalize(cfg: &ResolverConfig, final_url: &str, body: &str) -> String {
    let Ok(parsed) = Url::parse(final_url) else {
        return final_url.to_string();
    };
    let host = parsed.host_str().unwrap_or_default();

    if cfg.is_aggregator_host(host) {
        if let Some(link) = first_external_href(cfg, body) {
            return tidy_url(&link);
        }
        if let Some(link) = url_param_in_body(cfg, body) {
            return tidy_url(&link);
        }
        return final_url.to_string();
    }

    // Tracking redirectors on publisher hosts: `...?url=<target>`
    let target = parsed
        .query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case("url"))
        .map(|(_, v)| v.into_owned());
    if let Some(t) = target.filter(|t| is_external(cfg, t)) {
        return tidy_url(&t);
    }
    tidy_url(final_url)
}

/// Redirect-following resolver backed by `reqwest`.
pub struct HttpResolver {
    client: Client,
    cfg: ResolverConfig,
}

impl HttpResolver {
    pub fn new(cfg: ResolverConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .redirect(Policy::limited(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, cfg }
    }

    /// One GET; returns the final URL and, when still on the aggregator, the body.
    pub async fn fetch_final(&self, url: &str) -> Result<(String, String), ResolveError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::Request(e.to_string()))?;
        let final_url = resp.url().to_string();
        let on_aggregator = resp
            .url()
            .host_str()
            .is_some_and(|h| self.cfg.is_aggregator_host(h));
        let body = if on_aggregator {
            resp.text()
                .await
                .map_err(|e| ResolveError::Body(e.to_string()))?
        } else {
            String::new()
        };
        Ok((final_url, body))
    }
}

#[async_trait]
impl UrlResolver for HttpResolver {
    async fn resolve(&self, url: &str) -> String {
        if url.trim().is_empty() {
            return url.to_string();
        }
        match self.fetch_final(url).await {
            Ok((final_url, body)) => canonicalize(&self.cfg, &final_url, &body),
            Err(e) => {
                tracing::warn!(
                    target: "resolve",
                    error = %truncate_diag(&e, 120),
                    "resolve failed, keeping original link"
                );
                url.to_string()
            }
        }
    }
}

/// Resolver that performs no network calls (resolution disabled).
pub struct PassthroughResolver;

#[async_trait]
impl UrlResolver for PassthroughResolver {
    async fn resolve(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Memoises resolutions per link for the lifetime of one run.
pub struct MemoResolver<R: UrlResolver> {
    inner: R,
    memo: Mutex<HashMap<String, String>>,
}

impl<R: UrlResolver> MemoResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn memo_len(&self) -> usize {
        self.memo.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl<R: UrlResolver> UrlResolver for MemoResolver<R> {
    async fn resolve(&self, url: &str) -> String {
        if let Some(hit) = self.memo.lock().ok().and_then(|m| m.get(url).cloned()) {
            return hit;
        }
        let out = self.inner.resolve(url).await;
        if let Ok(mut m) = self.memo.lock() {
            m.insert(url.to_string(), out.clone());
        }
        out
    }
}

/// Canonical URL for an entry: a publisher alternate link if the feed gave one,
/// otherwise the resolved primary link.
pub async fn resolve_entry(
    resolver: &dyn UrlResolver,
    cfg: &ResolverConfig,
    entry: RawEntry,
) -> ResolvedEntry {
    let canonical_url = match entry.alt_links.iter().find(|l| is_external(cfg, l)) {
        Some(alt) => tidy_url(alt),
        None => resolver.resolve(&entry.link).await,
    };
    ResolvedEntry {
        entry,
        canonical_url,
    }
}
