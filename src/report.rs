//! Report assembler: renders the daily digest as Telegram HTML and splits it
//! into messages that fit the transport limit.
//!
//! Lengths are counted in chars, which is what the chat API limits on.
//! Paragraphs (`\n\n`) are the preferred split points; a paragraph longer than
//! a whole message is split at its last line break that fits, otherwise just
//! before any tag or entity the cut would land in. Every part after the
//! first gets an `(i/n)\n` prefix, and stripping those prefixes and
//! concatenating gives back the rendered digest byte for byte.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use crate::analyze::Annotation;
use crate::config::ReportConfig;
use crate::rank::Pick;

pub const EMPTY_PLACEHOLDER: &str = "（今日無相關新聞）";
/// Chars kept free in every part for the `(i/n)\n` prefix.
pub const PREFIX_RESERVE: usize = 16;
/// Smallest limit [`chunk`] honours; anything lower is raised to this.
pub const MIN_CHUNK_LIMIT: usize = 2 * PREFIX_RESERVE;

const LOCALITY_HEADING: &str = "📍 新北市";
const OTHER_HEADING: &str = "🌐 其他縣市與全國";

#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub label: String,
    pub locality: Vec<Pick>,
    pub other: Vec<Pick>,
    pub recommendation: Annotation,
}

impl CategoryReport {
    pub fn pick_count(&self) -> usize {
        self.locality.len() + self.other.len()
    }
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub date: NaiveDate,
    pub categories: Vec<CategoryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestSummary {
    pub date: String,
    pub categories: usize,
    pub picks: usize,
}

impl Digest {
    pub fn summary(&self) -> DigestSummary {
        DigestSummary {
            date: self.date.to_string(),
            categories: self.categories.len(),
            picks: self.categories.iter().map(CategoryReport::pick_count).sum(),
        }
    }
}

/// Calendar date of `now` at a fixed UTC offset (Taipei is +8, no DST).
pub fn local_date(now: u64, utc_offset_hours: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_hours.clamp(-23, 23) * 3600)
        .unwrap_or_else(|| Utc.fix());
    let utc = DateTime::<Utc>::from_timestamp(now as i64, 0).unwrap_or_default();
    utc.with_timezone(&offset).date_naive()
}

/// Escape `& < > "` for Telegram HTML parse mode.
pub fn escape(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

fn render_pick(n: usize, p: &Pick) -> String {
    let mut line = format!(
        "{n}. <a href=\"{}\">{}</a>",
        escape(&p.entry.canonical_url),
        escape(p.title())
    );
    if let Some(src) = p.entry.source_name() {
        line.push_str(&format!("（{}）", escape(src)));
    }
    if let Some(a) = p.annotation.as_ref().filter(|a| a.is_ai()) {
        line.push_str("\n   ");
        line.push_str(&escape(&a.text));
    }
    line
}

fn render_section(heading: &str, picks: &[Pick]) -> String {
    let mut out = format!("<b>{heading}</b>\n");
    if picks.is_empty() {
        out.push_str(EMPTY_PLACEHOLDER);
    } else {
        let lines: Vec<String> = picks
            .iter()
            .enumerate()
            .map(|(i, p)| render_pick(i + 1, p))
            .collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

fn render_category(c: &CategoryReport) -> String {
    [
        format!("<b>【{}】</b>", escape(&c.label)),
        render_section(LOCALITY_HEADING, &c.locality),
        render_section(OTHER_HEADING, &c.other),
        format!("💡 <b>行政建議</b>：{}", escape(&c.recommendation.text)),
    ]
    .join("\n\n")
}

/// Full digest text, before chunking.
pub fn render(digest: &Digest, cfg: &ReportConfig) -> String {
    let mut parts = vec![format!(
        "<b>{}</b>\n{}",
        escape(&cfg.title),
        digest.date.format("%Y-%m-%d")
    )];
    parts.extend(digest.categories.iter().map(render_category));
    parts.join("\n\n")
}

/// Split `text` into parts of at most `limit` chars. Limits below
/// [`MIN_CHUNK_LIMIT`] are raised to it.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let limit = limit.max(MIN_CHUNK_LIMIT);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let budget = limit - PREFIX_RESERVE;

    let mut bodies: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for para in text.split_inclusive("\n\n") {
        let plen = para.chars().count();
        if cur_len + plen <= budget {
            cur.push_str(para);
            cur_len += plen;
            continue;
        }
        if !cur.is_empty() {
            bodies.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if plen <= budget {
            cur.push_str(para);
            cur_len = plen;
            continue;
        }
        let chars: Vec<char> = para.chars().collect();
        let mut start = 0;
        while chars.len() - start > budget {
            let cut = hard_cut(&chars[start..start + budget]);
            bodies.push(chars[start..start + cut].iter().collect());
            start += cut;
        }
        cur = chars[start..].iter().collect();
        cur_len = chars.len() - start;
    }
    if !cur.is_empty() {
        bodies.push(cur);
    }

    let n = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, b)| {
            if i == 0 {
                b
            } else {
                format!("({}/{n})\n{b}", i + 1)
            }
        })
        .collect()
}

/// Where to end a part taken from `window`, which is a full budget of an
/// oversized paragraph. Always in `1..=window.len()`.
fn hard_cut(window: &[char]) -> usize {
    if let Some(i) = window.iter().rposition(|&c| c == '\n') {
        return i + 1;
    }
    let unclosed = |open: char, close: char| {
        window
            .iter()
            .rposition(|&c| c == open)
            .filter(|&i| !window[i..].contains(&close))
    };
    match (unclosed('<', '>'), unclosed('&', ';')) {
        (Some(a), Some(b)) if a.min(b) > 0 => a.min(b),
        (Some(i), None) | (None, Some(i)) if i > 0 => i,
        _ => window.len(),
    }
}

/// Inverse of the part prefix added by [`chunk`].
pub fn strip_part_prefix(part: &str) -> &str {
    let Some(rest) = part.strip_prefix('(') else {
        return part;
    };
    let Some((counter, body)) = rest.split_once(")\n") else {
        return part;
    };
    let well_formed = counter
        .split_once('/')
        .is_some_and(|(a, b)| {
            !a.is_empty()
                && !b.is_empty()
                && a.chars().all(|c| c.is_ascii_digit())
                && b.chars().all(|c| c.is_ascii_digit())
        });
    if well_formed {
        body
    } else {
        part
    }
}

/// Render and chunk.
pub fn assemble(digest: &Digest, cfg: &ReportConfig) -> Vec<String> {
    let text = render(digest, cfg);
    let parts = chunk(&text, cfg.message_limit);
    tracing::debug!(
        target: "report",
        chars = text.chars().count(),
        parts = parts.len(),
        "digest assembled"
    );
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{RawEntry, ResolvedEntry};
    use crate::rank::Bucket;

    fn pick(title: &str, url: &str, annotation: Option<Annotation>) -> Pick {
        Pick {
            entry: ResolvedEntry {
                entry: RawEntry::new(title, url).with_source("聯合新聞網", None),
                canonical_url: url.to_string(),
            },
            bucket: Bucket::Locality,
            backfilled: false,
            key: url.to_string(),
            annotation,
        }
    }

    fn digest(categories: Vec<CategoryReport>) -> Digest {
        Digest {
            date: NaiveDate::from_ymd_opt(2025, 10, 18).unwrap(),
            categories,
        }
    }

    fn empty_category(label: &str) -> CategoryReport {
        CategoryReport {
            label: label.into(),
            locality: vec![],
            other: vec![],
            recommendation: Annotation::rule_based("持續關注。"),
        }
    }

    #[test]
    fn taipei_date_rolls_over_at_utc_16() {
        // 2025-10-17T15:59:59Z / 16:00:00Z
        assert_eq!(local_date(1_760_716_799, 8).to_string(), "2025-10-17");
        assert_eq!(local_date(1_760_716_800, 8).to_string(), "2025-10-18");
    }

    #[test]
    fn empty_categories_render_placeholders() {
        let text = render(
            &digest(vec![empty_category("交通安全"), empty_category("終身學習")]),
            &ReportConfig::default(),
        );
        assert!(text.starts_with("<b>教育輿情報告（新北核心＋全國動態）</b>\n2025-10-18"));
        assert_eq!(text.matches(EMPTY_PLACEHOLDER).count(), 4);
        assert_eq!(text.matches("行政建議").count(), 2);
        assert!(text.contains("持續關注。"));
    }

    #[test]
    fn picks_are_escaped_and_only_ai_annotations_shown() {
        let c = CategoryReport {
            label: "補習班業務".into(),
            locality: vec![pick(
                "新北 <補習班> & \"稽查\"",
                "https://udn.com/a?x=1&y=2",
                Some(Annotation::ai("加強稽查。")),
            )],
            other: vec![pick(
                "台中補習班",
                "https://udn.com/b",
                Some(Annotation::rule_based("不應出現")),
            )],
            recommendation: Annotation::ai("建議 <立即> 行動"),
        };
        let text = render(&digest(vec![c]), &ReportConfig::default());
        assert!(text.contains(
            "1. <a href=\"https://udn.com/a?x=1&amp;y=2\">新北 &lt;補習班&gt; &amp; &quot;稽查&quot;</a>（聯合新聞網）\n   加強稽查。"
        ));
        assert!(!text.contains("不應出現"));
        assert!(text.contains("建議 &lt;立即&gt; 行動"));
        assert!(!text.contains(EMPTY_PLACEHOLDER));
    }

    #[test]
    fn short_text_is_one_unprefixed_part() {
        assert_eq!(chunk("hello\n\nworld", 100), vec!["hello\n\nworld"]);
        assert!(chunk("", 100).is_empty());
    }

    #[test]
    fn chunks_respect_limit_and_reassemble() {
        let paras: Vec<String> = (0..40)
            .map(|i| format!("第{i}段 {}", "新北教育".repeat(i % 7 + 1)))
            .collect();
        let mut text = paras.join("\n\n");
        text.push_str("\n\n");
        text.push_str(&"長".repeat(300));

        for limit in [MIN_CHUNK_LIMIT, 40, 64, 100, 257, 4096] {
            let parts = chunk(&text, limit);
            assert!(parts.iter().all(|p| p.chars().count() <= limit), "limit {limit}");
            let joined: String = parts.iter().map(|p| strip_part_prefix(p)).collect();
            assert_eq!(joined, text, "limit {limit}");
            if parts.len() > 1 {
                let n = parts.len();
                assert!(parts[1].starts_with(&format!("(2/{n})\n")));
                assert!(!parts[0].starts_with('('));
            }
        }
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let parts = chunk(&text, 50);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], format!("{}\n\n", "a".repeat(30)));
        assert_eq!(parts[1], format!("(2/2)\n{}", "b".repeat(30)));
    }

    #[test]
    fn tiny_limits_are_raised_to_the_minimum() {
        let text = "新北".repeat(100);
        for limit in [0usize, 1, PREFIX_RESERVE, MIN_CHUNK_LIMIT - 1] {
            let parts = chunk(&text, limit);
            assert_eq!(parts, chunk(&text, MIN_CHUNK_LIMIT), "limit {limit}");
            assert!(parts.iter().all(|p| p.chars().count() <= MIN_CHUNK_LIMIT));
            let joined: String = parts.iter().map(|p| strip_part_prefix(p)).collect();
            assert_eq!(joined, text);
        }
    }

    #[test]
    fn long_paragraph_splits_after_a_line_break() {
        let line = format!("{}\n", "x".repeat(19));
        let text = line.repeat(10);
        let parts = chunk(&text, 64);
        assert!(parts.len() > 1);
        for p in &parts {
            let body = strip_part_prefix(p);
            assert!(body.ends_with('\n'), "{body:?}");
            assert_eq!(body.chars().count() % 20, 0);
        }
    }

    #[test]
    fn hard_split_never_lands_inside_a_tag_or_entity() {
        let link = r#"<a href="https://udn.com/n/1?a=1&amp;b=2">新北 &amp; 校園</a>"#;
        let text = link.repeat(12);
        for limit in [64usize, 80, 100, 150] {
            let parts = chunk(&text, limit);
            assert!(parts.len() > 1);
            let joined: String = parts.iter().map(|p| strip_part_prefix(p)).collect();
            assert_eq!(joined, text, "limit {limit}");
            for p in &parts {
                assert!(p.chars().count() <= limit);
                let body = strip_part_prefix(p);
                assert_eq!(body.matches('<').count(), body.matches('>').count(), "{body:?}");
                assert_eq!(body.matches('&').count(), body.matches(';').count(), "{body:?}");
            }
        }
    }

    #[test]
    fn strip_prefix_leaves_ordinary_text_alone() {
        assert_eq!(strip_part_prefix("(3/12)\nbody"), "body");
        assert_eq!(strip_part_prefix("(備註)\nbody"), "(備註)\nbody");
        assert_eq!(strip_part_prefix("plain"), "plain");
    }
}
