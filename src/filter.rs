//! Filter stage: recency-or-update AND category relevance.
//!
//! Both predicates look at the title only. Matching is plain substring,
//! ASCII case-insensitive (CJK text has no case).

use metrics::counter;

use crate::config::{FilterConfig, RelevanceRule};
use crate::ingest::types::RawEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Older than the recency window and no update signal in the title.
    Stale,
    /// No `must_include` term present.
    Irrelevant,
    /// An `exclude` term is present.
    Excluded,
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<RawEntry>,
    pub stale: usize,
    pub irrelevant: usize,
    pub excluded: usize,
}

impl FilterOutcome {
    pub fn dropped(&self) -> usize {
        self.stale + self.irrelevant + self.excluded
    }
}

pub fn contains_any(text: &str, terms: &[String]) -> bool {
    let hay = text.to_lowercase();
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .any(|t| hay.contains(&t.to_lowercase()))
}

#[derive(Debug, Clone)]
pub struct FilterStage {
    window_secs: u64,
    update_signals: Vec<String>,
}

impl FilterStage {
    pub fn new(cfg: &FilterConfig) -> Self {
        Self {
            window_secs: cfg.recency_window_secs(),
            update_signals: cfg.update_signals.clone(),
        }
    }

    /// Undated entries pass; future timestamps count as fresh.
    pub fn is_recent_or_update(&self, entry: &RawEntry, now: u64) -> bool {
        match entry.published_at {
            None => true,
            Some(ts) => {
                now.saturating_sub(ts) <= self.window_secs
                    || contains_any(&entry.title, &self.update_signals)
            }
        }
    }

    pub fn check_relevance(title: &str, rule: Option<&RelevanceRule>) -> Result<(), DropReason> {
        let Some(rule) = rule else {
            return Ok(());
        };
        if !rule.must_include.is_empty() && !contains_any(title, &rule.must_include) {
            return Err(DropReason::Irrelevant);
        }
        if contains_any(title, &rule.exclude) {
            return Err(DropReason::Excluded);
        }
        Ok(())
    }

    pub fn check(
        &self,
        entry: &RawEntry,
        rule: Option<&RelevanceRule>,
        now: u64,
    ) -> Result<(), DropReason> {
        if !self.is_recent_or_update(entry, now) {
            return Err(DropReason::Stale);
        }
        Self::check_relevance(&entry.title, rule)
    }

    /// Keep entries passing every predicate, preserving order.
    pub fn apply(
        &self,
        entries: Vec<RawEntry>,
        rule: Option<&RelevanceRule>,
        now: u64,
    ) -> FilterOutcome {
        let mut out = FilterOutcome {
            kept: Vec::with_capacity(entries.len()),
            ..FilterOutcome::default()
        };
        for e in entries {
            match self.check(&e, rule, now) {
                Ok(()) => out.kept.push(e),
                Err(DropReason::Stale) => out.stale += 1,
                Err(DropReason::Irrelevant) => out.irrelevant += 1,
                Err(DropReason::Excluded) => out.excluded += 1,
            }
        }
        counter!("digest_filtered_total").increment(out.dropped() as u64);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000;
    const HOUR: u64 = 3_600;

    fn stage() -> FilterStage {
        FilterStage::new(&FilterConfig::default())
    }

    #[test]
    fn undated_entries_pass() {
        let e = RawEntry::new("新北交通新制", "https://a.test/1");
        assert!(stage().is_recent_or_update(&e, NOW));
    }

    #[test]
    fn stale_passes_only_with_update_signal() {
        let old = NOW - 72 * HOUR;
        let plain = RawEntry::new("補習班違規遭罰", "https://a.test/1").published(old);
        let update = RawEntry::new("補習班違規 再開罰 十萬", "https://a.test/2").published(old);
        assert!(!stage().is_recent_or_update(&plain, NOW));
        assert!(stage().is_recent_or_update(&update, NOW));
    }

    #[test]
    fn window_boundary_is_inclusive_and_future_is_fresh() {
        let edge = RawEntry::new("x", "l").published(NOW - 24 * HOUR);
        let past = RawEntry::new("x", "l").published(NOW - 24 * HOUR - 1);
        let future = RawEntry::new("x", "l").published(NOW + HOUR);
        assert!(stage().is_recent_or_update(&edge, NOW));
        assert!(!stage().is_recent_or_update(&past, NOW));
        assert!(stage().is_recent_or_update(&future, NOW));
    }

    #[test]
    fn relevance_rule_needs_include_and_no_exclude() {
        let rule = RelevanceRule {
            must_include: vec!["補習班".into(), "補教".into()],
            exclude: vec!["警方".into()],
        };
        assert_eq!(
            FilterStage::check_relevance("新北補習班公安稽查", Some(&rule)),
            Ok(())
        );
        assert_eq!(
            FilterStage::check_relevance("新北校園午餐", Some(&rule)),
            Err(DropReason::Irrelevant)
        );
        assert_eq!(
            FilterStage::check_relevance("補習班老師遭警方逮捕", Some(&rule)),
            Err(DropReason::Excluded)
        );
    }

    #[test]
    fn exclude_only_rule_and_no_rule() {
        let rule = RelevanceRule {
            must_include: vec![],
            exclude: vec!["家暴".into()],
        };
        assert_eq!(FilterStage::check_relevance("交通新制上路", Some(&rule)), Ok(()));
        assert_eq!(
            FilterStage::check_relevance("家暴案件", Some(&rule)),
            Err(DropReason::Excluded)
        );
        assert_eq!(FilterStage::check_relevance("anything", None), Ok(()));
    }

    #[test]
    fn ascii_terms_match_case_insensitively() {
        assert!(contains_any("New Taipei MRT", &["mrt".to_string()]));
        assert!(!contains_any("abc", &["  ".to_string()]));
    }

    #[test]
    fn apply_counts_drop_reasons() {
        let rule = RelevanceRule {
            must_include: vec!["補習班".into()],
            exclude: vec!["藝人".into()],
        };
        let entries = vec![
            RawEntry::new("補習班新規", "l1").published(NOW - HOUR),
            RawEntry::new("補習班舊聞", "l2").published(NOW - 48 * HOUR),
            RawEntry::new("社區大學開課", "l3").published(NOW - HOUR),
            RawEntry::new("藝人開補習班", "l4"),
        ];
        let out = stage().apply(entries, Some(&rule), NOW);
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].link, "l1");
        assert_eq!((out.stale, out.irrelevant, out.excluded), (1, 1, 1));
    }
}
