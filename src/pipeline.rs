// src/pipeline.rs
//! End-to-end run: collect → filter → extract/summarize → themes → signals →
//! heuristics + narrative. Strictly sequential between stages.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Config;
use crate::extract::{Article, ArticleExtractor, HtmlTextExtractor, NoopSummarizer, Summarizer};
use crate::http::HttpFetcher;
use crate::ingest::collect_latest;
use crate::ingest::filter::FilterStats;
use crate::market::source::{PriceSource, YahooChartSource};
use crate::market::SignalEngine;
use crate::narrative::{assess_all, DisabledAnalyst, NarrativeAnalyst, ThemeAssessment};
use crate::themes::{InstrumentMap, KeywordThemeBuilder, ThemeBuilder};

/// How a run ended. The first two are terminating but not failures.
#[derive(Debug)]
pub enum RunOutcome {
    NoLinks,
    NoArticles { links: usize },
    Completed(RunReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub links_considered: usize,
    pub themes: Vec<ThemeAssessment>,
    pub articles: Vec<Article>,
}

pub struct Pipeline {
    cfg: Arc<Config>,
    cache: Cache,
    fetcher: Arc<dyn HttpFetcher>,
    prices: Arc<dyn PriceSource>,
    extractor: Arc<dyn ArticleExtractor>,
    summarizer: Arc<dyn Summarizer>,
    theme_builder: Arc<dyn ThemeBuilder>,
    analyst: Arc<dyn NarrativeAnalyst>,
}

impl Pipeline {
    /// Pipeline with the offline defaults: HTML text extraction, no summaries,
    /// keyword themes, Yahoo prices, and a disabled narrative analyst.
    pub fn new(cfg: Arc<Config>, cache: Cache, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            prices: Arc::new(YahooChartSource::new(Arc::clone(&fetcher))),
            extractor: Arc::new(HtmlTextExtractor::new(Arc::clone(&fetcher))),
            summarizer: Arc::new(NoopSummarizer),
            theme_builder: Arc::new(KeywordThemeBuilder::new()),
            analyst: Arc::new(DisabledAnalyst),
            cfg,
            cache,
            fetcher,
        }
    }

    pub fn with_prices(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ArticleExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_theme_builder(mut self, builder: Arc<dyn ThemeBuilder>) -> Self {
        self.theme_builder = builder;
        self
    }

    pub fn with_analyst(mut self, analyst: Arc<dyn NarrativeAnalyst>) -> Self {
        self.analyst = analyst;
        self
    }

    /// Load the theme→instrument map (missing file → empty map).
    pub fn load_instrument_map(&self, path: &Path) -> Result<InstrumentMap> {
        self.cache
            .read_file(path, InstrumentMap::new())
            .with_context(|| format!("loading instrument map {}", path.display()))
    }

    pub async fn run(&self, instrument_map: &InstrumentMap, now: DateTime<Utc>) -> Result<RunOutcome> {
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
        describe_counter!(
            "pipeline_raw_save_errors_total",
            "Raw article snapshots that could not be written."
        );
        gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

        // 1) Links
        let (links, stats) = collect_latest(&self.cfg, Arc::clone(&self.fetcher), now).await;
        if links.is_empty() {
            return Ok(RunOutcome::NoLinks);
        }

        // 2) Articles
        let articles = self.extract_articles(&links, &stats).await?;
        if articles.is_empty() {
            return Ok(RunOutcome::NoArticles { links: links.len() });
        }

        // 3) Themes
        let themes = self
            .theme_builder
            .build(&articles, instrument_map)
            .await
            .context("building themes")?;
        tracing::info!(themes = themes.len(), articles = articles.len(), "themes built");

        // 4) Signals
        let engine = SignalEngine::new(Arc::clone(&self.prices), self.cfg.market.history_days)
            .with_concurrency(self.cfg.market.fetch_concurrency);
        let bundles = engine.bundle_themes(&themes, now).await;

        // 5) Verdicts
        let assessed = assess_all(bundles, &self.cfg.market.signals, self.analyst.as_ref()).await;

        Ok(RunOutcome::Completed(RunReport {
            generated_at: now,
            links_considered: links.len(),
            themes: assessed,
            articles,
        }))
    }

    async fn extract_articles(
        &self,
        links: &[crate::ingest::types::LinkItem],
        stats: &FilterStats,
    ) -> Result<Vec<Article>> {
        let max_total = self.cfg.project.max_total_articles;
        let mut articles = Vec::new();
        for link in links {
            let mut art = match self.extractor.extract(link).await {
                Ok(Some(a)) if !a.text.trim().is_empty() => a,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, url = %link.url, "extraction failed");
                    continue;
                }
            };

            art.summary = match self.summarizer.summarize(&art).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, url = %art.url, "summary failed");
                    None
                }
            };

            if self.cfg.output.save_raw_articles {
                let rel = format!("raw_articles/{}.json", Cache::derive_key(&art.url));
                if let Err(e) = self.cache.write(&rel, &art) {
                    tracing::warn!(error = %e, url = %art.url, "raw article snapshot failed");
                    counter!("pipeline_raw_save_errors_total").increment(1);
                }
            }

            articles.push(art);
            if articles.len() >= max_total {
                break;
            }
        }
        tracing::info!(links = stats.kept, extracted = articles.len(), "articles extracted");
        Ok(articles)
    }

    /// Write the report JSON under the output directory; returns its path.
    pub fn write_report(&self, report: &RunReport) -> Result<std::path::PathBuf> {
        let out = Cache::new(&self.cfg.project.output_dir)?;
        let path = out.write(&self.cfg.output.report_filename, report)?;
        Ok(path)
    }
}
