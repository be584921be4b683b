//! insight-radar: binary entrypoint.
//! Loads config, runs the pipeline once, writes the report.

use std::sync::Arc;

use anyhow::{Context, Result};
use insight_radar::config::{etf_map_path, Config};
use insight_radar::http::ReqwestFetcher;
use insight_radar::telemetry::{init_tracing, Metrics};
use insight_radar::{Cache, Pipeline, RunOutcome};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Arc::new(Config::load_default()?);
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let cache = Cache::new(&cfg.project.cache_dir).context("opening cache")?;
    let fetcher = Arc::new(ReqwestFetcher::new(&cfg.project.user_agent, cfg.request_timeout())?);
    let pipeline = Pipeline::new(Arc::clone(&cfg), cache, fetcher);

    let instrument_map = pipeline.load_instrument_map(&etf_map_path())?;
    let now = chrono::Utc::now();

    match pipeline.run(&instrument_map, now).await? {
        RunOutcome::NoLinks => {
            warn!("no links found; add rss_feeds or a news_index for each website");
        }
        RunOutcome::NoArticles { links } => {
            warn!(links, "no articles extracted successfully");
        }
        RunOutcome::Completed(report) => {
            let path = pipeline.write_report(&report)?;
            info!(
                path = %path.display(),
                themes = report.themes.len(),
                articles = report.articles.len(),
                "report written (not financial advice)"
            );
        }
    }

    if let (true, Some(m)) = (cfg.output.write_metrics, metrics.as_ref()) {
        match m.write_snapshot(&cfg.project.output_dir) {
            Ok(p) => info!(path = %p.display(), "metrics snapshot written"),
            Err(e) => warn!(error = ?e, "metrics snapshot failed"),
        }
    }
    Ok(())
}
