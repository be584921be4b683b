// src/market/source.rs
//! Daily close-price history providers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::http::{FetchError, HttpFetcher};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Self {
        let points = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&c, date)| PricePoint {
                date,
                close: Some(c),
            })
            .collect();
        Self { points }
    }

    /// Raw closes as reported, gaps included.
    pub fn closes(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.points.iter().map(|p| p.close)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || self.points.iter().all(|p| p.close.is_none())
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Daily closes for `ticker` within `[start, end]`. `Ok(None)` means the
    /// source knows nothing about the ticker for that range.
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PriceHistory>>;

    fn name(&self) -> &'static str;
}

/// Yahoo Finance chart endpoint, fetched through the shared HTTP client.
pub struct YahooChartSource {
    fetcher: Arc<dyn HttpFetcher>,
    base_url: String,
}

impl YahooChartSource {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetcher,
            base_url: CHART_URL.to_string(),
        }
    }

    /// Point at another chart-compatible endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let p1 = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
        let p2 = end.and_hms_opt(23, 59, 59).map(|d| d.and_utc().timestamp()).unwrap_or(0);
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url, ticker, p1, p2
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
}

/// Turn a chart JSON body into a history. Missing result/close arrays mean "no data".
pub fn parse_chart(body: &str) -> Result<Option<PriceHistory>> {
    let resp: ChartResponse = serde_json::from_str(body).context("parsing chart json")?;
    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let Some(closes) = result.indicators.quote.into_iter().next().and_then(|q| q.close) else {
        return Ok(None);
    };
    if closes.is_empty() {
        return Ok(None);
    }

    let points = closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| {
            let date = result
                .timestamp
                .get(i)
                .and_then(|ts| DateTime::<Utc>::from_timestamp(*ts, 0))
                .map(|dt| dt.date_naive())
                .unwrap_or_default();
            PricePoint { date, close }
        })
        .collect();
    Ok(Some(PriceHistory { points }))
}

#[async_trait]
impl PriceSource for YahooChartSource {
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PriceHistory>> {
        let url = self.chart_url(ticker, start, end);
        let body = match self.fetcher.get_text(&url).await {
            Ok(b) => b,
            // Unknown symbols come back as 404.
            Err(FetchError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("chart request for {ticker}")),
        };
        parse_chart(&body).with_context(|| format!("chart body for {ticker}"))
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closes_with_gaps() {
        let body = r#"{"chart":{"result":[{"timestamp":[1760918400,1761004800,1761091200],
            "indicators":{"quote":[{"close":[10.5,null,11.0]}]}}],"error":null}}"#;
        let h = parse_chart(body).unwrap().unwrap();
        assert_eq!(h.points.len(), 3);
        assert_eq!(h.closes().collect::<Vec<_>>(), vec![Some(10.5), None, Some(11.0)]);
        assert_eq!(h.points[0].date, NaiveDate::from_ymd_opt(2025, 10, 20).unwrap());
    }

    #[test]
    fn missing_result_or_close_is_no_data() {
        let none = r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#;
        assert!(parse_chart(none).unwrap().is_none());
        let no_close = r#"{"chart":{"result":[{"timestamp":[1],"indicators":{"quote":[{}]}}]}}"#;
        assert!(parse_chart(no_close).unwrap().is_none());
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(parse_chart("<html>").is_err());
    }
}
