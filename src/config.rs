// src/config.rs
//! Run configuration: one immutable `Config` loaded from TOML and validated once.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::SignalThresholds;

pub const ENV_CONFIG_PATH: &str = "INSIGHT_RADAR_CONFIG";
pub const ENV_ETF_MAP_PATH: &str = "INSIGHT_RADAR_ETF_MAP";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_ETF_MAP_PATH: &str = "etf_map.json";
/// Upper bound for `lookback_days` and `history_days` (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config from {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("INSIGHT_RADAR_CONFIG points to non-existent path {}", .0.display())]
    MissingEnvPath(PathBuf),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub rss_feeds: Vec<String>,
    pub websites: Vec<WebsiteConfig>,
    pub filters: FilterConfig,
    pub market: MarketConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub user_agent: String,
    /// Articles older than this many days are dropped (undated ones are kept).
    pub lookback_days: u32,
    pub max_articles_per_site: usize,
    pub max_total_articles: usize,
    pub request_timeout_secs: u64,
    /// Global cap on simultaneous source fetches; 1 keeps the run sequential.
    pub fetch_concurrency: usize,
    pub per_host_concurrency: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            output_dir: PathBuf::from("output"),
            user_agent: "insight-radar/0.1 (+research)".to_string(),
            lookback_days: 2,
            max_articles_per_site: 8,
            max_total_articles: 30,
            request_timeout_secs: 30,
            fetch_concurrency: 1,
            per_host_concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub name: String,
    #[serde(default)]
    pub news_index: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub history_days: u32,
    pub fetch_concurrency: usize,
    pub signals: SignalThresholds,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            history_days: 365,
            fetch_concurrency: 1,
            signals: SignalThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_raw_articles: bool,
    pub report_filename: String,
    pub write_metrics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_raw_articles: false,
            report_filename: "report.json".to_string(),
            write_metrics: true,
        }
    }
}

impl Config {
    /// Parse a TOML document. Callers validate separately.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config using env var + fallbacks:
    /// 1) $INSIGHT_RADAR_CONFIG (must exist)
    /// 2) ./config.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingEnvPath(pb));
            }
            return Self::load_from(&pb);
        }
        let local = PathBuf::from(DEFAULT_CONFIG_PATH);
        if local.exists() {
            return Self::load_from(&local);
        }
        tracing::info!("no config file found, using built-in defaults");
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.project;
        if p.user_agent.trim().is_empty() {
            return Err(invalid("project.user_agent must not be empty"));
        }
        if p.max_articles_per_site == 0 || p.max_total_articles == 0 {
            return Err(invalid("article quotas must be at least 1"));
        }
        if p.request_timeout_secs == 0 {
            return Err(invalid("project.request_timeout_secs must be at least 1"));
        }
        if p.fetch_concurrency == 0 || p.per_host_concurrency == 0 {
            return Err(invalid("project concurrency limits must be at least 1"));
        }
        if p.lookback_days > MAX_WINDOW_DAYS {
            return Err(invalid(&format!(
                "project.lookback_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }
        if self.market.history_days == 0 || self.market.history_days > MAX_WINDOW_DAYS {
            return Err(invalid(&format!(
                "market.history_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.market.fetch_concurrency == 0 {
            return Err(invalid("market.fetch_concurrency must be at least 1"));
        }
        let s = &self.market.signals;
        let all_finite = [s.strong_move_1m, s.strong_drop_1m, s.z_threshold, s.drawdown_deep]
            .iter()
            .all(|x| x.is_finite());
        if !all_finite {
            return Err(invalid("market.signals thresholds must be finite"));
        }
        if s.z_threshold < 0.0 {
            return Err(invalid("market.signals.z_threshold must be >= 0"));
        }
        if self.output.report_filename.trim().is_empty() {
            return Err(invalid("output.report_filename must not be empty"));
        }
        let f = &self.filters;
        if f.include_keywords.iter().chain(&f.exclude_keywords).any(|k| k.trim().is_empty()) {
            return Err(invalid("filters keywords must not be blank"));
        }
        if let Some(w) = self.websites.iter().find(|w| w.name.trim().is_empty()) {
            return Err(invalid(&format!(
                "website entry with index {:?} has an empty name",
                w.news_index
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.project.request_timeout_secs)
    }
}

/// Path of the theme→instrument map, honoring `$INSIGHT_RADAR_ETF_MAP`.
pub fn etf_map_path() -> PathBuf {
    std::env::var(ENV_ETF_MAP_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ETF_MAP_PATH))
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.project.lookback_days, 2);
        assert_eq!(cfg.project.max_articles_per_site, 8);
        assert_eq!(cfg.market.history_days, 365);
        assert!((cfg.market.signals.z_threshold - 2.0).abs() < 1e-12);
        assert!(cfg.rss_feeds.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = Config::from_toml_str(
            r#"
rss_feeds = ["https://example.test/feed.xml"]

[project]
max_total_articles = 5

[[websites]]
name = "Example"
news_index = "https://example.test/news"

[[websites]]
name = "NoIndex"

[market.signals]
strong_move_1m = 0.15
"#,
        )
        .unwrap();
        assert_eq!(cfg.project.max_total_articles, 5);
        assert_eq!(cfg.project.max_articles_per_site, 8);
        assert_eq!(cfg.websites.len(), 2);
        assert_eq!(cfg.websites[1].news_index, None);
        assert!((cfg.market.signals.strong_move_1m - 0.15).abs() < 1e-12);
        assert!((cfg.market.signals.drawdown_deep + 0.15).abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_zero_quota_and_blank_agent() {
        let mut cfg = Config::default();
        cfg.project.max_total_articles = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.project.user_agent = "  ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.market.signals.z_threshold = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_bounds_day_windows() {
        let mut cfg = Config::default();
        cfg.project.lookback_days = MAX_WINDOW_DAYS;
        cfg.market.history_days = MAX_WINDOW_DAYS;
        cfg.validate().unwrap();

        let mut cfg = Config::default();
        cfg.project.lookback_days = u32::MAX;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.market.history_days = MAX_WINDOW_DAYS + 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validation_rejects_blank_keywords() {
        let mut cfg = Config::default();
        cfg.filters.exclude_keywords = vec!["sponsored".into(), "  ".into()];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.filters.include_keywords = vec![String::new()];
        assert!(cfg.validate().is_err());
    }
}
