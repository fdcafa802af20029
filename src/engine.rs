//! # Digest Engine
//! One scheduled run: for each category fetch → filter → resolve → dedup →
//! rank → annotate, then assemble, deliver and persist the cache.
//!
//! Every stage degrades instead of failing, so one category coming back empty
//! never affects the others. All external calls are awaited one at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::Instrument;

use crate::analyze::{build_ai_client, Annotation, Annotator};
use crate::cache::SeenCache;
use crate::config::{BotConfig, CategoryConfig, Secrets};
use crate::dedup::{DedupStage, SeenSet};
use crate::error::truncate_diag;
use crate::filter::FilterStage;
use crate::ingest::fetch_category;
use crate::ingest::providers::google_news::GoogleNewsFeed;
use crate::ingest::types::{FeedSource, ResolvedEntry};
use crate::notify::{deliver_chunks, DeliveryReport, Notifier, TelegramNotifier};
use crate::rank::RankingStage;
use crate::report::{assemble, local_date, CategoryReport, Digest, DigestSummary};
use crate::resolve::{resolve_entry, HttpResolver, MemoResolver, PassthroughResolver, UrlResolver};

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Per-category stage counts, logged at the end of each category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryStats {
    pub label: String,
    pub fetched: usize,
    pub filtered_out: usize,
    pub duplicates: usize,
    pub picked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub digest: DigestSummary,
    pub categories: Vec<CategoryStats>,
    pub parts: usize,
    pub sent: usize,
    pub failed: usize,
    /// Cache keys forgotten because nothing was delivered.
    pub rolled_back: usize,
    pub cache_saved: bool,
}

pub struct DigestEngine {
    cfg: BotConfig,
    feed: Arc<dyn FeedSource>,
    resolver: Arc<dyn UrlResolver>,
    annotator: Annotator,
    notifier: Arc<dyn Notifier>,
    filter: FilterStage,
    dedup: DedupStage,
    ranking: RankingStage,
}

impl DigestEngine {
    pub fn new(
        cfg: BotConfig,
        feed: Arc<dyn FeedSource>,
        resolver: Arc<dyn UrlResolver>,
        annotator: Annotator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let filter = FilterStage::new(&cfg.filter);
        let dedup = DedupStage::new(&cfg.dedup, &cfg.resolver);
        let ranking = RankingStage::new(&cfg.ranking);
        Self {
            cfg,
            feed,
            resolver,
            annotator,
            notifier,
            filter,
            dedup,
            ranking,
        }
    }

    /// Production wiring: Google News feed, HTTP resolver, Gemini (if keyed), Telegram.
    pub fn from_config(cfg: BotConfig, secrets: &Secrets) -> Self {
        let feed: Arc<dyn FeedSource> = Arc::new(GoogleNewsFeed::new(cfg.feed.clone()));
        let resolver: Arc<dyn UrlResolver> = if cfg.resolver.enabled {
            Arc::new(MemoResolver::new(HttpResolver::new(cfg.resolver.clone())))
        } else {
            Arc::new(PassthroughResolver)
        };
        let client = build_ai_client(&cfg.ai, secrets.gemini_api_key.as_deref());
        let annotator = Annotator::new(client, &cfg.ai);
        let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
            &cfg.notify,
            secrets.telegram_token.clone(),
            secrets.telegram_chat_id.clone(),
        ));
        tracing::info!(
            feed = feed.name(),
            resolver_enabled = cfg.resolver.enabled,
            ai = annotator.provider_name(),
            transport = notifier.name(),
            categories = cfg.categories.len(),
            "engine wired"
        );
        Self::new(cfg, feed, resolver, annotator, notifier)
    }

    fn cache_path(&self) -> PathBuf {
        self.cfg.cache.path.clone()
    }

    /// Full pipeline for one category. Picks are marked in `cache` as they are emitted;
    /// `seen` holds everything earlier categories of this run already accepted.
    pub async fn build_category(
        &self,
        category: &CategoryConfig,
        seen: &mut SeenSet,
        cache: &mut SeenCache,
        now: u64,
    ) -> (CategoryReport, CategoryStats) {
        let mut stats = CategoryStats {
            label: category.label.clone(),
            ..CategoryStats::default()
        };

        let pool = fetch_category(
            self.feed.as_ref(),
            category,
            self.cfg.feed.per_query_limit,
        )
        .await;
        stats.fetched = pool.len();

        let filtered = self.filter.apply(pool, category.rule.as_ref(), now);
        stats.filtered_out = filtered.dropped();

        let mut resolved: Vec<ResolvedEntry> = Vec::with_capacity(filtered.kept.len());
        for entry in filtered.kept {
            resolved.push(resolve_entry(self.resolver.as_ref(), &self.cfg.resolver, entry).await);
        }

        let deduped = self.dedup.dedupe(resolved, seen, cache, now);
        stats.duplicates = deduped.in_run + deduped.cross_run;

        let (mut locality, mut other) = self
            .ranking
            .rank_and_pick(deduped.kept, &self.dedup, cache, now);
        stats.picked = locality.len() + other.len();

        for pick in locality.iter_mut().chain(other.iter_mut()) {
            pick.annotation = Some(
                self.annotator
                    .annotate_pick(pick.title())
                    .await
                    .unwrap_or_else(|| Annotation::rule_based(&category.fallback)),
            );
        }

        let titles: Vec<&str> = locality
            .iter()
            .chain(other.iter())
            .map(|p| p.title())
            .collect();
        let recommendation = self
            .annotator
            .recommend(&category.label, &titles, &category.fallback)
            .await;

        tracing::info!(
            target: "engine",
            fetched = stats.fetched,
            filtered_out = stats.filtered_out,
            duplicates = stats.duplicates,
            locality = locality.len(),
            other = other.len(),
            ai_recommendation = recommendation.is_ai(),
            "category done"
        );

        let report = CategoryReport {
            label: category.label.clone(),
            locality,
            other,
            recommendation,
        };
        (report, stats)
    }

    /// All categories in configured order.
    pub async fn build_digest(
        &self,
        cache: &mut SeenCache,
        now: u64,
    ) -> (Digest, Vec<CategoryStats>) {
        let mut categories = Vec::with_capacity(self.cfg.categories.len());
        let mut stats = Vec::with_capacity(self.cfg.categories.len());
        let mut seen = SeenSet::new();
        for category in &self.cfg.categories {
            let span = tracing::info_span!("category", label = %category.label);
            let (report, s) = self
                .build_category(category, &mut seen, cache, now)
                .instrument(span)
                .await;
            categories.push(report);
            stats.push(s);
        }
        let digest = Digest {
            date: local_date(now, self.cfg.report.utc_offset_hours),
            categories,
        };
        (digest, stats)
    }

    /// Build and deliver with an already-loaded cache; the cache is not persisted.
    pub async fn run_with_cache(
        &self,
        cache: &mut SeenCache,
        now: u64,
    ) -> (RunReport, Vec<String>) {
        let (digest, stats) = self.build_digest(cache, now).await;
        let parts = assemble(&digest, &self.cfg.report);

        let delivery: DeliveryReport = deliver_chunks(
            self.notifier.as_ref(),
            &parts,
            Duration::from_millis(self.cfg.notify.pause_ms),
        )
        .await;

        let rolled_back = if delivery.all_failed() {
            let n = cache.rollback_run();
            tracing::warn!(
                target: "engine",
                keys = n,
                "nothing was delivered, forgetting this run's picks"
            );
            n
        } else {
            0
        };

        let report = RunReport {
            digest: digest.summary(),
            categories: stats,
            parts: parts.len(),
            sent: delivery.sent,
            failed: delivery.failed,
            rolled_back,
            cache_saved: false,
        };
        (report, parts)
    }

    /// Load the cache, run, persist the cache. Never fails; problems are logged.
    pub async fn run_once(&self, now: u64) -> RunReport {
        let path = self.cache_path();
        let mut cache = SeenCache::load(&path, self.cfg.cache.ttl_secs(), now);

        let (mut report, _) = self.run_with_cache(&mut cache, now).await;

        match cache.save(&path) {
            Ok(()) => report.cache_saved = true,
            Err(e) => tracing::warn!(
                target: "cache",
                path = %path.display(),
                error = %truncate_diag(&e, 160),
                "cache write failed"
            ),
        }

        tracing::info!(
            target: "engine",
            date = %report.digest.date,
            picks = report.digest.picks,
            parts = report.parts,
            sent = report.sent,
            failed = report.failed,
            cache_entries = cache.len(),
            "run finished"
        );
        report
    }
}
