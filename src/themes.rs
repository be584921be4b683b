// src/themes.rs
//! Themes and their instruments. Clustering articles into themes is an
//! external concern behind `ThemeBuilder`; `KeywordThemeBuilder` is the
//! offline stand-in driven by the theme→instrument map.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::extract::Article;
use crate::market::MarketSignal;
use crate::sentiment::SentimentAnalyzer;

/// Theme keyword → instrument tickers, as loaded from the map file.
pub type InstrumentMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Conventionally in [-1, 1].
    pub sentiment: f64,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub suggested_instruments: Vec<String>,
    #[serde(default)]
    pub article_urls: Vec<String>,
}

impl Theme {
    pub fn all_instruments(&self) -> Vec<String> {
        merge_instruments(&self.instruments, &self.suggested_instruments)
    }
}

/// Union of two ticker lists, first-seen order, blanks dropped.
pub fn merge_instruments(primary: &[String], suggested: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    primary
        .iter()
        .chain(suggested)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSignalBundle {
    pub theme: Theme,
    pub sentiment: f64,
    pub signals: Vec<MarketSignal>,
}

#[async_trait]
pub trait ThemeBuilder: Send + Sync {
    async fn build(&self, articles: &[Article], map: &InstrumentMap) -> Result<Vec<Theme>>;
}

/// One theme per map key that appears (case-insensitively) in an article's
/// title or text. Sentiment is the mean lexicon score of matching articles.
#[derive(Debug, Clone, Default)]
pub struct KeywordThemeBuilder {
    analyzer: SentimentAnalyzer,
}

impl KeywordThemeBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThemeBuilder for KeywordThemeBuilder {
    async fn build(&self, articles: &[Article], map: &InstrumentMap) -> Result<Vec<Theme>> {
        let lowered: Vec<String> = articles
            .iter()
            .map(|a| format!("{} {}", a.title, a.text).to_lowercase())
            .collect();

        let mut themes = Vec::new();
        for (keyword, tickers) in map {
            let needle = keyword.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            let matching: Vec<&Article> = articles
                .iter()
                .zip(&lowered)
                .filter(|(_, text)| text.contains(&needle))
                .map(|(a, _)| a)
                .collect();
            if matching.is_empty() {
                continue;
            }

            let sentiment = matching
                .iter()
                .map(|a| self.analyzer.normalized(&format!("{} {}", a.title, a.text)))
                .sum::<f64>()
                / matching.len() as f64;

            themes.push(Theme {
                name: keyword.clone(),
                description: format!("{} article(s) mention \"{keyword}\"", matching.len()),
                sentiment,
                instruments: tickers.clone(),
                suggested_instruments: Vec::new(),
                article_urls: matching.iter().map(|a| a.url.clone()).collect(),
            });
        }
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, text: &str) -> Article {
        Article {
            url: format!("https://x.test/{}", title.len()),
            title: title.into(),
            site_name: "X".into(),
            published: None,
            text: text.into(),
            summary: None,
        }
    }

    #[test]
    fn merge_keeps_first_seen_order() {
        let a = vec!["SMH".to_string(), "XLK".into(), "SMH".into()];
        let b = vec!["SOXX".to_string(), "XLK".into(), " ".into()];
        assert_eq!(merge_instruments(&a, &b), vec!["SMH", "XLK", "SOXX"]);
    }

    #[tokio::test]
    async fn keyword_builder_matches_and_scores() {
        let mut map = InstrumentMap::new();
        map.insert("Semiconductor".into(), vec!["SMH".into()]);
        map.insert("shipping".into(), vec!["BDRY".into()]);

        let arts = vec![
            article("Semiconductor stocks rally", "Demand surges for chips."),
            article("Weather report", "Sunny."),
        ];
        let themes = KeywordThemeBuilder::new().build(&arts, &map).await.unwrap();
        assert_eq!(themes.len(), 1);
        assert_eq!(themes[0].name, "Semiconductor");
        assert_eq!(themes[0].instruments, vec!["SMH"]);
        assert!(themes[0].sentiment > 0.35);
    }
}
