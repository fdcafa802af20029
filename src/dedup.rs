//! Dedup stage: in-run duplicates and cross-run (cache) duplicates.
//!
//! In-run state lives in a [`SeenSet`] owned by the caller, so one set can
//! span every category of a run.
//!
//! Key precedence: the canonical URL when it points at a publisher, otherwise
//! `title:<normalized title>`. The cache is only read here; keys are written
//! when an entry is actually picked (see `rank`).

use metrics::counter;
use std::collections::HashSet;

use crate::cache::SeenCache;
use crate::config::{DedupConfig, ResolverConfig};
use crate::ingest::types::ResolvedEntry;
use crate::resolve::is_external;

const TITLE_KEY_PREFIX: &str = "title:";
const SUFFIX_SEPARATORS: &[char] = &['-', '–', '—', '－', '|', '｜'];

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub kept: Vec<ResolvedEntry>,
    pub in_run: usize,
    pub cross_run: usize,
}

/// Keys and normalized titles already accepted during the current run.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<String>,
    titles: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(&self, key: &str, title: &str) -> bool {
        self.keys.contains(key) || (!title.is_empty() && self.titles.contains(title))
    }

    fn insert(&mut self, key: String, title: String) {
        self.keys.insert(key);
        if !title.is_empty() {
            self.titles.insert(title);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DedupStage {
    resolver: ResolverConfig,
    outlets: Vec<String>,
}

impl DedupStage {
    pub fn new(cfg: &DedupConfig, resolver: &ResolverConfig) -> Self {
        let mut outlets: Vec<String> = cfg
            .outlet_suffixes
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        // longest first so "中央社 CNA" wins over "中央社"
        outlets.sort_by_key(|o| std::cmp::Reverse(o.chars().count()));
        Self {
            resolver: resolver.clone(),
            outlets,
        }
    }

    /// Title with the trailing `- Outlet` suffix removed and all whitespace dropped.
    pub fn normalize_title(&self, title: &str, source_name: Option<&str>) -> String {
        let mut t = title.trim();
        let own = source_name.map(str::trim).filter(|s| !s.is_empty());
        for outlet in own.into_iter().chain(self.outlets.iter().map(String::as_str)) {
            if let Some(stripped) = strip_outlet_suffix(t, outlet) {
                t = stripped;
                break;
            }
        }
        t.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Primary dedup/cache key for an entry.
    pub fn key_for(&self, e: &ResolvedEntry) -> String {
        if is_external(&self.resolver, &e.canonical_url) {
            e.canonical_url.clone()
        } else {
            format!(
                "{TITLE_KEY_PREFIX}{}",
                self.normalize_title(&e.entry.title, e.entry.source_name())
            )
        }
    }

    /// Drop in-run repeats (same key or same normalized title as anything in
    /// `seen`) and live cache hits. First occurrence wins; order is preserved.
    pub fn dedupe(
        &self,
        entries: Vec<ResolvedEntry>,
        seen: &mut SeenSet,
        cache: &SeenCache,
        now: u64,
    ) -> DedupOutcome {
        let mut out = DedupOutcome::default();

        for e in entries {
            let key = self.key_for(&e);
            let title = self.normalize_title(&e.entry.title, e.entry.source_name());
            if seen.contains(&key, &title) {
                out.in_run += 1;
                continue;
            }
            seen.insert(key.clone(), title);

            if cache.is_live(&key, now) {
                tracing::debug!(target: "dedup", %key, "already delivered");
                out.cross_run += 1;
                continue;
            }
            out.kept.push(e);
        }

        counter!("digest_dedup_total").increment((out.in_run + out.cross_run) as u64);
        out
    }
}

fn strip_outlet_suffix<'a>(title: &'a str, outlet: &str) -> Option<&'a str> {
    let rest = title.strip_suffix(outlet)?.trim_end();
    let rest = rest.strip_suffix(SUFFIX_SEPARATORS)?.trim_end();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RawEntry;

    const NOW: u64 = 1_760_000_000;

    fn stage() -> DedupStage {
        DedupStage::new(&DedupConfig::default(), &ResolverConfig::default())
    }

    fn resolved(title: &str, canonical: &str) -> ResolvedEntry {
        ResolvedEntry {
            entry: RawEntry::new(title, "https://news.google.com/rss/articles/x"),
            canonical_url: canonical.to_string(),
        }
    }

    #[test]
    fn title_normalization_strips_known_outlet_and_whitespace() {
        let s = stage();
        assert_eq!(
            s.normalize_title("新北 補習班  公安稽查 - 聯合新聞網", None),
            "新北補習班公安稽查"
        );
        assert_eq!(
            s.normalize_title("新北補習班公安稽查｜中央社 CNA", None),
            "新北補習班公安稽查"
        );
        // unknown outlet stays
        assert_eq!(s.normalize_title("標題 - 某小報", None), "標題-某小報");
        // the entry's own source name counts as an outlet
        assert_eq!(s.normalize_title("標題 - 某小報", Some("某小報")), "標題");
        // a bare outlet name is not stripped to nothing
        assert_eq!(s.normalize_title("- 聯合新聞網", None), "-聯合新聞網");
    }

    #[test]
    fn key_prefers_publisher_url() {
        let s = stage();
        assert_eq!(
            s.key_for(&resolved("t", "https://udn.com/news/story/1")),
            "https://udn.com/news/story/1"
        );
        assert_eq!(
            s.key_for(&resolved("A B - 自由時報", "https://news.google.com/rss/articles/x")),
            "title:ab"
        );
    }

    #[test]
    fn first_occurrence_wins_by_url_or_title() {
        let entries = vec![
            resolved("新北交通新制 - 聯合新聞網", "https://udn.com/1"),
            resolved("另一則", "https://udn.com/1"),
            resolved("新北交通新制 - 自由時報", "https://ltn.com.tw/9"),
            resolved("第三則", "https://news.google.com/rss/articles/z"),
        ];
        let mut seen = SeenSet::new();
        let out = stage().dedupe(entries, &mut seen, &SeenCache::new(86_400), NOW);
        let titles: Vec<_> = out.kept.iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["新北交通新制 - 聯合新聞網", "第三則"]);
        assert_eq!(out.in_run, 2);
        assert_eq!(out.cross_run, 0);
    }

    #[test]
    fn live_cache_hits_are_dropped_expired_are_not() {
        let mut cache = SeenCache::new(5 * 86_400);
        cache.mark("https://udn.com/recent", NOW - 2 * 86_400);
        cache.mark("https://udn.com/old", NOW - 6 * 86_400);
        let entries = vec![
            resolved("a", "https://udn.com/recent"),
            resolved("b", "https://udn.com/old"),
        ];
        let out = stage().dedupe(entries, &mut SeenSet::new(), &cache, NOW);
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].canonical_url, "https://udn.com/old");
        assert_eq!(out.cross_run, 1);
    }

    #[test]
    fn seen_set_carries_across_calls() {
        let s = stage();
        let cache = SeenCache::new(86_400);
        let mut seen = SeenSet::new();

        let first = s.dedupe(
            vec![resolved("新北校園交通安全總體檢 - 聯合新聞網", "https://udn.com/n/1")],
            &mut seen,
            &cache,
            NOW,
        );
        assert_eq!(first.kept.len(), 1);

        let second = s.dedupe(
            vec![
                resolved("新北校園交通安全總體檢 - 自由時報", "https://news.ltn.com.tw/n/9"),
                resolved("另一則新聞", "https://udn.com/n/1"),
                resolved("全新標題", "https://udn.com/n/2"),
            ],
            &mut seen,
            &cache,
            NOW,
        );
        let titles: Vec<_> = second.kept.iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["全新標題"]);
        assert_eq!(second.in_run, 2);
        assert_eq!(seen.len(), 2);
    }
}
