// src/ingest/mod.rs
pub mod filter;
pub mod index_page;
pub mod rss;
pub mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::http::{host_of, HttpFetcher};
use crate::ingest::filter::{apply_filters, FilterStats};
use crate::ingest::types::{LinkItem, SourceError, SourceSpec};

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_links_total", "Links kept from sources after keyword filtering.");
        describe_counter!("ingest_source_errors_total", "Feed/index fetch or parse failures.");
        describe_counter!("ingest_dedup_total", "Links removed as duplicate URLs.");
        describe_counter!("ingest_stale_total", "Links older than the lookback window.");
        describe_counter!("ingest_quota_dropped_total", "Links dropped by per-site or total caps.");
        describe_histogram!("ingest_fetch_ms", "Per-source fetch+parse time in milliseconds.");
    });
}

/// Normalize a title: decode entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&decoded, " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring filter over title and URL. Exclude wins;
/// a non-empty include list must match at least once. Blank keywords are
/// ignored here; `Config::validate` rejects them in configured lists.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let clean = |v: &[String]| {
            v.iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            include: clean(include),
            exclude: clean(exclude),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.filters.include_keywords, &cfg.filters.exclude_keywords)
    }

    pub fn passes(&self, title: &str, url: &str) -> bool {
        let t = title.to_lowercase();
        let u = url.to_lowercase();
        let hit = |k: &String| t.contains(k.as_str()) || u.contains(k.as_str());

        if self.exclude.iter().any(hit) {
            return false;
        }
        if !self.include.is_empty() {
            return self.include.iter().any(hit);
        }
        true
    }
}

/// Lenient publish-date parsing; anything unrecognized is `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Configured sources in collection order: every feed, then every index page.
pub fn sources_from_config(cfg: &Config) -> Vec<SourceSpec> {
    let feeds = cfg
        .rss_feeds
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(|u| SourceSpec::Feed { url: u.to_string() });
    let pages = cfg.websites.iter().filter_map(|w| {
        let idx = w.news_index.as_deref()?.trim();
        (!idx.is_empty()).then(|| SourceSpec::IndexPage {
            url: idx.to_string(),
            site_name: w.name.clone(),
        })
    });
    feeds.chain(pages).collect()
}

/// Fetch and parse one source.
pub async fn fetch_source(
    fetcher: &dyn HttpFetcher,
    spec: &SourceSpec,
    filter: &KeywordFilter,
) -> Result<Vec<LinkItem>, SourceError> {
    let body = fetcher.get_text(spec.url()).await?;
    match spec {
        SourceSpec::Feed { url } => rss::parse_feed(&body, url, filter),
        SourceSpec::IndexPage { url, site_name } => {
            index_page::parse_index(&body, url, site_name, filter)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub global: usize,
    pub per_host: usize,
}

impl FetchLimits {
    pub fn sequential() -> Self {
        Self {
            global: 1,
            per_host: 1,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            global: cfg.project.fetch_concurrency.max(1),
            per_host: cfg.project.per_host_concurrency.max(1),
        }
    }
}

/// Collect links from all sources. A failing source contributes nothing and
/// is logged; the others still run. Results are merged by source index, so
/// the output order is the configured order whatever the concurrency.
pub async fn collect_links(
    fetcher: Arc<dyn HttpFetcher>,
    sources: &[SourceSpec],
    filter: &KeywordFilter,
    limits: FetchLimits,
) -> Vec<LinkItem> {
    ensure_metrics_described();

    let global = Arc::new(Semaphore::new(limits.global.max(1)));
    let mut per_host: HashMap<String, Arc<Semaphore>> = HashMap::new();
    let mut handles = Vec::with_capacity(sources.len());

    for spec in sources {
        let host_sem = per_host
            .entry(host_of(spec.url()))
            .or_insert_with(|| Arc::new(Semaphore::new(limits.per_host.max(1))))
            .clone();
        let global = Arc::clone(&global);
        let fetcher = Arc::clone(&fetcher);
        let filter = filter.clone();
        let spec = spec.clone();

        handles.push(tokio::spawn(async move {
            let _host = host_sem.acquire_owned().await;
            let _slot = global.acquire_owned().await;
            let t0 = std::time::Instant::now();
            let res = fetch_source(fetcher.as_ref(), &spec, &filter).await;
            histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            res
        }));
    }

    let mut all = Vec::new();
    for (spec, handle) in sources.iter().zip(handles) {
        match handle.await {
            Ok(Ok(mut items)) => {
                tracing::debug!(kind = spec.kind(), url = spec.url(), n = items.len(), "source ok");
                counter!("ingest_links_total").increment(items.len() as u64);
                all.append(&mut items);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, kind = spec.kind(), url = spec.url(), "source skipped");
                counter!("ingest_source_errors_total").increment(1);
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = spec.kind(), url = spec.url(), "source task failed");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }
    all
}

/// Collect from every configured source, then dedup, recency-filter and cap.
pub async fn collect_latest(
    cfg: &Config,
    fetcher: Arc<dyn HttpFetcher>,
    now: DateTime<Utc>,
) -> (Vec<LinkItem>, FilterStats) {
    let sources = sources_from_config(cfg);
    let filter = KeywordFilter::from_config(cfg);
    let raw = collect_links(fetcher, &sources, &filter, FetchLimits::from_config(cfg)).await;

    let p = &cfg.project;
    let (kept, stats) = apply_filters(
        raw,
        now,
        p.lookback_days,
        p.max_articles_per_site,
        p.max_total_articles,
    );

    counter!("ingest_dedup_total").increment(stats.duplicates as u64);
    counter!("ingest_stale_total").increment(stats.stale as u64);
    counter!("ingest_quota_dropped_total").increment(stats.over_quota as u64);
    tracing::info!(
        target: "ingest",
        sources = sources.len(),
        input = stats.input,
        duplicates = stats.duplicates,
        stale = stats.stale,
        over_quota = stats.over_quota,
        kept = stats.kept,
        "links collected"
    );

    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn normalize_title_strips_tags_and_entities() {
        let out = normalize_title("  <b>Fed&nbsp;holds</b>\n rates &amp; signals  ");
        assert_eq!(out, "Fed holds rates & signals");
    }

    #[test]
    fn exclude_beats_include_and_matching_is_case_insensitive() {
        let f = KeywordFilter::new(&["Chip".into()], &["SPONSORED".into()]);
        assert!(f.passes("Chip makers gain", "https://x.test/a"));
        assert!(f.passes("Semis gain", "https://x.test/chips/a"));
        assert!(!f.passes("Sponsored: chip deals", "https://x.test/a"));
        assert!(!f.passes("Oil falls", "https://x.test/b"));
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let f = KeywordFilter::new(&["  ".into()], &[]);
        assert!(f.passes("anything", "https://x.test"));
    }

    #[test]
    fn lenient_dates() {
        let d = parse_published("Mon, 19 Oct 2026 08:30:00 GMT").unwrap();
        assert_eq!((d.day(), d.hour(), d.minute()), (19, 8, 30));
        let d = parse_published("2026-10-18T10:00:00+02:00").unwrap();
        assert_eq!(d.hour(), 8);
        let d = parse_published("Sun, 18 Oct 2026 21:40:00 -0500").unwrap();
        assert_eq!((d.day(), d.hour()), (19, 2));
        let d = parse_published("Sun, 18 Oct 2026 21:40:00 EST").unwrap();
        assert_eq!((d.day(), d.hour()), (19, 2));
        assert!(parse_published("2026-10-17").is_some());
        assert!(parse_published("yesterday-ish").is_none());
        assert!(parse_published("").is_none());
    }

    #[test]
    fn sources_are_feeds_then_index_pages() {
        let mut cfg = Config::default();
        cfg.rss_feeds = vec!["https://f1.test/rss".into(), " ".into()];
        cfg.websites = vec![
            crate::config::WebsiteConfig {
                name: "Site".into(),
                news_index: Some("https://s.test/news".into()),
            },
            crate::config::WebsiteConfig {
                name: "NoIndex".into(),
                news_index: None,
            },
        ];
        let s = sources_from_config(&cfg);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].kind(), "rss");
        assert_eq!(s[1].url(), "https://s.test/news");
    }
}
