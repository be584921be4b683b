// tests/common/mod.rs
//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use insight_radar::http::{FetchError, HttpFetcher};
use insight_radar::market::source::{PriceHistory, PriceSource};

pub const RSS_FIXTURE: &str = include_str!("../fixtures/markets_rss.xml");
pub const INDEX_FIXTURE: &str = include_str!("../fixtures/news_index.html");

/// URL → canned response. Unknown URLs are a 404. Every call is recorded.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn failing(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(
            url.to_string(),
            Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(r) => r.clone(),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Ticker → canned closes. `None` entry means "no data"; missing ticker is an error.
#[derive(Default)]
pub struct FakePrices {
    series: HashMap<String, Option<Vec<f64>>>,
}

impl FakePrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, closes: Vec<f64>) -> Self {
        self.series.insert(ticker.to_string(), Some(closes));
        self
    }

    pub fn empty(mut self, ticker: &str) -> Self {
        self.series.insert(ticker.to_string(), None);
        self
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> anyhow::Result<Option<PriceHistory>> {
        match self.series.get(ticker) {
            Some(Some(closes)) => Ok(Some(PriceHistory::from_closes(start, closes))),
            Some(None) => Ok(None),
            None => anyhow::bail!("upstream timeout for {ticker}"),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Geometric series: `start * (1 + step)^i`.
pub fn trending(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start * (1.0 + step).powi(i as i32)).collect()
}
