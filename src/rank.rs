//! Ranking stage: locality-related entries first, per-bucket caps, backfill.
//!
//! Entries are consumed in feed order. Whatever exceeds a bucket's cap goes to
//! a shared overflow list (feed order) that a short bucket may draw from.
//! Every entry placed in a bucket is marked in the cache immediately.

use metrics::counter;
use serde::Serialize;

use crate::analyze::Annotation;
use crate::cache::SeenCache;
use crate::config::RankingConfig;
use crate::dedup::DedupStage;
use crate::filter::contains_any;
use crate::ingest::types::ResolvedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bucket {
    Locality,
    Other,
}

/// An entry selected for the digest.
#[derive(Debug, Clone)]
pub struct Pick {
    pub entry: ResolvedEntry,
    pub bucket: Bucket,
    /// Placed from the overflow of the other side.
    pub backfilled: bool,
    /// Cache key written on emission.
    pub key: String,
    pub annotation: Option<Annotation>,
}

impl Pick {
    pub fn title(&self) -> &str {
        self.entry.title()
    }
}

#[derive(Debug, Clone)]
pub struct RankingStage {
    gazetteer: Vec<String>,
    locality_cap: usize,
    other_cap: usize,
    min_fill: usize,
}

impl RankingStage {
    pub fn new(cfg: &RankingConfig) -> Self {
        Self {
            gazetteer: cfg.gazetteer.clone(),
            locality_cap: cfg.locality_cap,
            other_cap: cfg.other_cap,
            min_fill: cfg.min_fill,
        }
    }

    pub fn with_caps(mut self, locality_cap: usize, other_cap: usize) -> Self {
        self.locality_cap = locality_cap;
        self.other_cap = other_cap;
        self
    }

    pub fn is_locality(&self, title: &str) -> bool {
        contains_any(title, &self.gazetteer)
    }

    /// Split into (locality, other) picks and mark each pick's key in `cache`.
    pub fn rank_and_pick(
        &self,
        entries: Vec<ResolvedEntry>,
        keys: &DedupStage,
        cache: &mut SeenCache,
        now: u64,
    ) -> (Vec<Pick>, Vec<Pick>) {
        let mut locality: Vec<ResolvedEntry> = Vec::new();
        let mut other: Vec<ResolvedEntry> = Vec::new();
        let mut overflow: Vec<(Bucket, ResolvedEntry)> = Vec::new();

        for e in entries {
            if self.is_locality(e.title()) {
                if locality.len() < self.locality_cap {
                    locality.push(e);
                } else {
                    overflow.push((Bucket::Locality, e));
                }
            } else if other.len() < self.other_cap {
                other.push(e);
            } else {
                overflow.push((Bucket::Other, e));
            }
        }

        let mut locality: Vec<(ResolvedEntry, bool)> =
            locality.into_iter().map(|e| (e, false)).collect();
        let mut other: Vec<(ResolvedEntry, bool)> =
            other.into_iter().map(|e| (e, false)).collect();

        // Backfill: locality side first, from the shared overflow in feed order.
        backfill(
            &mut locality,
            self.min_fill.min(self.locality_cap),
            &mut overflow,
        );
        backfill(&mut other, self.min_fill.min(self.other_cap), &mut overflow);

        let mut emit = |items: Vec<(ResolvedEntry, bool)>, bucket: Bucket| -> Vec<Pick> {
            items
                .into_iter()
                .map(|(entry, backfilled)| {
                    let key = keys.key_for(&entry);
                    cache.mark(&key, now);
                    Pick {
                        entry,
                        bucket,
                        backfilled,
                        key,
                        annotation: None,
                    }
                })
                .collect()
        };
        let loc_picks = emit(locality, Bucket::Locality);
        let oth_picks = emit(other, Bucket::Other);

        tracing::debug!(
            target: "rank",
            locality = loc_picks.len(),
            other = oth_picks.len(),
            overflow = overflow.len(),
            "ranked"
        );
        counter!("digest_picks_total").increment((loc_picks.len() + oth_picks.len()) as u64);
        (loc_picks, oth_picks)
    }
}

/// Move overflow entries into `bucket` until it holds `target` items.
fn backfill(
    bucket: &mut Vec<(ResolvedEntry, bool)>,
    target: usize,
    overflow: &mut Vec<(Bucket, ResolvedEntry)>,
) {
    while bucket.len() < target && !overflow.is_empty() {
        let (_, e) = overflow.remove(0);
        bucket.push((e, true));
    }
}
