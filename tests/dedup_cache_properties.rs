// tests/dedup_cache_properties.rs
use ntpc_news_digest::cache::SeenCache;
use ntpc_news_digest::config::{DedupConfig, RankingConfig, ResolverConfig};
use ntpc_news_digest::dedup::{DedupStage, SeenSet};
use ntpc_news_digest::ingest::types::{RawEntry, ResolvedEntry};
use ntpc_news_digest::rank::RankingStage;

const NOW: u64 = 1_760_756_400;
const DAY: u64 = 86_400;

fn resolved(title: &str, url: &str) -> ResolvedEntry {
    ResolvedEntry {
        entry: RawEntry::new(title, "https://news.google.com/rss/articles/CBMi"),
        canonical_url: url.to_string(),
    }
}

fn batch() -> Vec<ResolvedEntry> {
    vec![
        resolved("新北補習班公安稽查 - 聯合新聞網", "https://udn.com/news/1"),
        resolved("新北補習班公安稽查 - 自由時報", "https://news.ltn.com.tw/news/1"),
        resolved("台中補教新規上路", "https://www.cna.com.tw/news/2"),
        resolved("板橋課照中心評鑑", "https://news.google.com/rss/articles/unresolved"),
        resolved("高雄補習班火災", "https://udn.com/news/3"),
    ]
}

fn stages() -> (DedupStage, RankingStage) {
    (
        DedupStage::new(&DedupConfig::default(), &ResolverConfig::default()),
        RankingStage::new(&RankingConfig::default()),
    )
}

fn run(
    dedup: &DedupStage,
    rank: &RankingStage,
    cache: &mut SeenCache,
    now: u64,
) -> Vec<String> {
    let kept = dedup.dedupe(batch(), &mut SeenSet::new(), cache, now).kept;
    let (loc, oth) = rank.rank_and_pick(kept, dedup, cache, now);
    loc.iter().chain(oth.iter()).map(|p| p.key.clone()).collect()
}

#[test]
fn same_input_same_cache_same_picks() {
    let (dedup, rank) = stages();
    let start = SeenCache::new(5 * DAY);

    let mut a = start.clone();
    let mut b = start.clone();
    let picks_a = run(&dedup, &rank, &mut a, NOW);
    let picks_b = run(&dedup, &rank, &mut b, NOW);
    assert_eq!(picks_a, picks_b);
    assert_eq!(a.records(), b.records());
    assert_eq!(
        picks_a,
        vec![
            "https://udn.com/news/1".to_string(),
            "title:板橋課照中心評鑑".to_string(),
            "https://www.cna.com.tw/news/2".to_string(),
            "https://udn.com/news/3".to_string(),
        ]
    );
}

#[test]
fn second_pass_over_updated_cache_inserts_nothing() {
    let (dedup, rank) = stages();
    let mut cache = SeenCache::new(5 * DAY);
    let first = run(&dedup, &rank, &mut cache, NOW);
    assert_eq!(first.len(), 4);
    let snapshot = cache.records().clone();

    let second = run(&dedup, &rank, &mut cache, NOW + 60);
    assert!(second.is_empty());
    assert_eq!(cache.records(), &snapshot);
}

#[test]
fn expired_records_never_count_as_seen() {
    let (dedup, _) = stages();
    for age_days in 0..10u64 {
        let ttl_days = 5;
        let mut cache = SeenCache::new(ttl_days * DAY);
        cache.mark("https://udn.com/news/1", NOW - age_days * DAY - 1);
        let out = dedup.dedupe(
            vec![resolved("x", "https://udn.com/news/1")],
            &mut SeenSet::new(),
            &cache,
            NOW,
        );
        let expired = age_days * DAY + 1 > ttl_days * DAY;
        assert_eq!(out.kept.len() == 1, expired, "age {age_days}d");
    }
}

#[test]
fn load_prunes_what_is_expired_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(
        &path,
        format!(
            r#"{{"https://a.test/fresh":{{"ts":{}}},"https://a.test/stale":{{"ts":{}}}}}"#,
            NOW - DAY,
            NOW - 6 * DAY
        ),
    )
    .unwrap();
    let cache = SeenCache::load(&path, 5 * DAY, NOW);
    assert_eq!(cache.len(), 1);
    assert!(cache.is_live("https://a.test/fresh", NOW));
    assert!(cache.get("https://a.test/stale").is_none());
}
