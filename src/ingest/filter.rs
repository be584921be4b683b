// src/ingest/filter.rs
//! Dedup → recency → quota. Every stage keeps input order; quota outcomes
//! depend on it, so nothing here sorts.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::ingest::types::LinkItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub over_quota: usize,
    pub kept: usize,
}

/// Canonical dedup key: trimmed URL without its `#fragment`.
pub fn canonical_key(url: &str) -> &str {
    let url = url.trim();
    url.split('#').next().unwrap_or(url)
}

/// First occurrence of each canonical key wins; empty URLs are dropped.
pub fn dedupe_links(items: Vec<LinkItem>) -> Vec<LinkItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let key = canonical_key(&it.url);
        if key.is_empty() {
            continue;
        }
        if !seen.insert(key.to_string()) {
            continue;
        }
        out.push(it);
    }
    out
}

/// Keep undated items and items published at or after `now - lookback_days`.
/// A window reaching past the earliest representable instant keeps everything.
pub fn filter_recent(items: Vec<LinkItem>, now: DateTime<Utc>, lookback_days: u32) -> Vec<LinkItem> {
    let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(lookback_days))) else {
        return items;
    };
    items
        .into_iter()
        .filter(|it| it.published.map_or(true, |dt| dt >= cutoff))
        .collect()
}

/// Walk in order, capping each site at `max_per_site` and the whole run at `max_total`.
pub fn enforce_quotas(items: Vec<LinkItem>, max_per_site: usize, max_total: usize) -> Vec<LinkItem> {
    let mut per_site: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for it in items {
        if out.len() >= max_total {
            break;
        }
        let count = per_site.entry(it.site_name.clone()).or_insert(0);
        if *count >= max_per_site {
            continue;
        }
        *count += 1;
        out.push(it);
    }
    out
}

pub fn apply_filters(
    items: Vec<LinkItem>,
    now: DateTime<Utc>,
    lookback_days: u32,
    max_per_site: usize,
    max_total: usize,
) -> (Vec<LinkItem>, FilterStats) {
    let input = items.len();
    let deduped = dedupe_links(items);
    let after_dedup = deduped.len();
    let recent = filter_recent(deduped, now, lookback_days);
    let after_recent = recent.len();
    let kept = enforce_quotas(recent, max_per_site, max_total);

    let stats = FilterStats {
        input,
        duplicates: input - after_dedup,
        stale: after_dedup - after_recent,
        over_quota: after_recent - kept.len(),
        kept: kept.len(),
    };
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(url: &str, site: &str, published: Option<DateTime<Utc>>) -> LinkItem {
        LinkItem {
            title: format!("title for {url}"),
            url: url.into(),
            published,
            source: "test".into(),
            site_name: site.into(),
        }
    }

    #[test]
    fn fragments_collapse_and_first_wins() {
        let items = vec![
            item("https://a.test/x#a", "A", None),
            item("https://a.test/y", "A", None),
            item("https://a.test/x#b", "B", None),
            item("   ", "A", None),
        ];
        let out = dedupe_links(items);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://a.test/x#a");
        assert_eq!(out[0].site_name, "A");
        assert_eq!(out[1].url, "https://a.test/y");
    }

    #[test]
    fn recency_cutoff_is_inclusive_and_keeps_undated() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let items = vec![
            item("https://a.test/old", "A", Some(now - Duration::days(3))),
            item("https://a.test/edge", "A", Some(now - Duration::days(2))),
            item("https://a.test/undated", "A", None),
            item("https://a.test/new", "A", Some(now)),
        ];
        let out = filter_recent(items, now, 2);
        let urls: Vec<&str> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.test/edge", "https://a.test/undated", "https://a.test/new"]
        );
    }

    #[test]
    fn huge_lookback_keeps_everything_without_overflow() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let items = vec![
            item("https://a.test/ancient", "A", Some(now - Duration::days(3650))),
            item("https://a.test/undated", "A", None),
        ];
        assert_eq!(filter_recent(items, now, u32::MAX).len(), 2);
    }

    #[test]
    fn quotas_are_order_sensitive() {
        let items = vec![
            item("https://a.test/1", "A", None),
            item("https://a.test/2", "A", None),
            item("https://b.test/1", "B", None),
            item("https://a.test/3", "A", None),
            item("https://b.test/2", "B", None),
            item("https://c.test/1", "C", None),
        ];
        let out = enforce_quotas(items, 2, 4);
        let urls: Vec<&str> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.test/1",
                "https://a.test/2",
                "https://b.test/1",
                "https://b.test/2"
            ]
        );
    }

    #[test]
    fn stats_add_up() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let items = vec![
            item("https://a.test/1", "A", None),
            item("https://a.test/1#dup", "A", None),
            item("https://a.test/2", "A", Some(now - Duration::days(30))),
            item("https://a.test/3", "A", None),
            item("https://a.test/4", "A", None),
        ];
        let (kept, stats) = apply_filters(items, now, 7, 1, 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(
            stats,
            FilterStats {
                input: 5,
                duplicates: 1,
                stale: 1,
                over_quota: 2,
                kept: 1
            }
        );
    }
}
