// tests/report_chunking.rs
use chrono::NaiveDate;

use ntpc_news_digest::analyze::Annotation;
use ntpc_news_digest::config::ReportConfig;
use ntpc_news_digest::ingest::types::{RawEntry, ResolvedEntry};
use ntpc_news_digest::rank::{Bucket, Pick};
use ntpc_news_digest::report::{
    assemble, render, strip_part_prefix, CategoryReport, Digest, EMPTY_PLACEHOLDER,
};

fn pick(i: usize, bucket: Bucket) -> Pick {
    let url = format!("https://udn.com/news/story/7266/{i}?from=rss&x=<{i}>");
    Pick {
        entry: ResolvedEntry {
            entry: RawEntry::new(format!("新北市第{i}則 教育新聞 & \"標題\""), url.clone())
                .with_source("聯合新聞網", Some("https://udn.com")),
            canonical_url: url.clone(),
        },
        bucket,
        backfilled: false,
        key: url,
        annotation: Some(Annotation::ai(
            "本則新聞顯示地方政府正加強相關措施。建議新北市教育局持續追蹤並納入下學期宣導重點。"
                .repeat(i % 3 + 1),
        )),
    }
}

fn big_digest() -> Digest {
    let categories = (0..6)
        .map(|c| CategoryReport {
            label: format!("類別{c}"),
            locality: (0..3).map(|i| pick(c * 10 + i, Bucket::Locality)).collect(),
            other: if c % 2 == 0 {
                (3..5).map(|i| pick(c * 10 + i, Bucket::Other)).collect()
            } else {
                Vec::new()
            },
            recommendation: Annotation::rule_based("建議持續關注。"),
        })
        .collect();
    Digest {
        date: NaiveDate::from_ymd_opt(2025, 10, 18).unwrap(),
        categories,
    }
}

#[test]
fn every_part_fits_and_parts_reassemble_the_digest() {
    let digest = big_digest();
    for limit in [64usize, 200, 1000, 4096] {
        let cfg = ReportConfig {
            message_limit: limit,
            ..ReportConfig::default()
        };
        let full = render(&digest, &cfg);
        let parts = assemble(&digest, &cfg);
        assert!(!parts.is_empty());
        for p in &parts {
            assert!(p.chars().count() <= limit, "limit {limit}: {} chars", p.chars().count());
        }
        let joined: String = parts.iter().map(|p| strip_part_prefix(p)).collect();
        assert_eq!(joined, full, "limit {limit}");
    }
}

#[test]
fn large_digest_splits_on_paragraphs_when_possible() {
    let digest = big_digest();
    let cfg = ReportConfig::default();
    let full = render(&digest, &cfg);
    assert!(full.chars().count() > 4096);

    let parts = assemble(&digest, &cfg);
    assert!(parts.len() >= 2);
    let n = parts.len();
    for (i, p) in parts.iter().enumerate().skip(1) {
        assert!(p.starts_with(&format!("({}/{n})\n", i + 1)));
    }
    // no paragraph here is anywhere near 4096 chars, so every body ends on a boundary
    for p in &parts[..n - 1] {
        assert!(strip_part_prefix(p).ends_with("\n\n"));
    }
}

#[test]
fn zero_pick_category_block_is_never_blank() {
    let digest = Digest {
        date: NaiveDate::from_ymd_opt(2025, 10, 18).unwrap(),
        categories: vec![CategoryReport {
            label: "終身學習".into(),
            locality: vec![],
            other: vec![],
            recommendation: Annotation::rule_based("建議盤點社區大學資源。"),
        }],
    };
    let text = render(&digest, &ReportConfig::default());
    let block = text.split("<b>【終身學習】</b>").nth(1).unwrap();
    assert_eq!(block.matches(EMPTY_PLACEHOLDER).count(), 2);
    assert!(block.contains("建議盤點社區大學資源。"));
}
