// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::config::CategoryConfig;
use crate::error::truncate_diag;
use crate::ingest::types::{FeedSource, RawEntry};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_entries_fetched_total",
            "Entries parsed from feed queries."
        );
        describe_counter!(
            "digest_fetch_errors_total",
            "Feed fetch/parse errors (query yielded no entries)."
        );
        describe_counter!(
            "digest_filtered_total",
            "Entries dropped by recency or relevance rules."
        );
        describe_counter!(
            "digest_dedup_total",
            "Entries dropped as in-run or cross-run duplicates."
        );
        describe_counter!("digest_picks_total", "Entries selected into the digest.");
        describe_counter!(
            "digest_ai_fallbacks_total",
            "Annotations that fell back to the rule-based sentence."
        );
        describe_counter!(
            "digest_delivery_errors_total",
            "Chunks the chat transport did not accept."
        );
        describe_histogram!("digest_fetch_ms", "Feed fetch + parse time in milliseconds.");
    });
}

/// Normalize a feed title: decode entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (Unicode \s covers NBSP and the ideographic space)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Run one query; failures are logged and yield an empty list.
pub async fn fetch_or_empty(feed: &dyn FeedSource, query: &str, limit: usize) -> Vec<RawEntry> {
    ensure_metrics_described();
    match feed.fetch(query, limit).await {
        Ok(mut v) => {
            v.truncate(limit);
            v
        }
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                provider = feed.name(),
                query,
                error = %truncate_diag(&e, 120),
                "feed error, continuing with no entries"
            );
            counter!("digest_fetch_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Locality variant first, then the nationwide one; pools are concatenated in feed order.
pub async fn fetch_category(
    feed: &dyn FeedSource,
    category: &CategoryConfig,
    limit: usize,
) -> Vec<RawEntry> {
    let mut pool = Vec::new();
    for query in [&category.local_query, &category.national_query] {
        if query.trim().is_empty() {
            continue;
        }
        let mut got = fetch_or_empty(feed, query, limit).await;
        tracing::info!(
            target: "ingest",
            category = %category.label,
            query = %query,
            entries = got.len(),
            "query fetched"
        );
        pool.append(&mut got);
    }
    pool
}
