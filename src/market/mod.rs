// src/market/mod.rs
//! # Market Signal Engine
//! Windowed returns, 60-day volatility, last-move z-score and drawdown from
//! the 90-day high, computed per instrument from daily closes.

pub mod source;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::market::source::PriceSource;
use crate::themes::{Theme, ThemeSignalBundle};

/// Fewer valid closes than this and no signal is computed.
pub const MIN_CLOSES: usize = 30;
pub const VOL_WINDOW: usize = 60;
pub const DRAWDOWN_WINDOW: usize = 90;

pub const ERR_NO_DATA: &str = "no data";
pub const ERR_INSUFFICIENT: &str = "insufficient data";

/// Indicators for one instrument. Optional fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub ticker: String,
    pub last_close: f64,
    pub ret_1d: Option<f64>,
    pub ret_5d: Option<f64>,
    pub ret_1m: Option<f64>,
    pub ret_3m: Option<f64>,
    pub daily_vol_60d: Option<f64>,
    pub last_move_z: Option<f64>,
    pub drawdown_from_90d_high: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketSignal {
    Ok(SignalSnapshot),
    Error { ticker: String, error: String },
}

impl MarketSignal {
    pub fn error(ticker: &str, reason: impl Into<String>) -> Self {
        MarketSignal::Error {
            ticker: ticker.to_string(),
            error: reason.into(),
        }
    }

    pub fn ticker(&self) -> &str {
        match self {
            MarketSignal::Ok(s) => &s.ticker,
            MarketSignal::Error { ticker, .. } => ticker,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MarketSignal::Error { .. })
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            MarketSignal::Ok(_) => None,
            MarketSignal::Error { error, .. } => Some(error),
        }
    }
}

/// `close[last] / close[last-n] - 1`, or `None` with fewer than `n + 1` closes.
pub fn window_return(closes: &[f64], n: usize) -> Option<f64> {
    if closes.len() < n + 1 {
        return None;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - n];
    Some(last / base - 1.0)
}

/// Consecutive simple returns.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

fn tail<T>(xs: &[T], n: usize) -> &[T] {
    &xs[xs.len().saturating_sub(n)..]
}

/// Compute the full signal from raw closes. Non-finite and missing values are dropped first.
pub fn compute_signal<I>(ticker: &str, raw_closes: I) -> MarketSignal
where
    I: IntoIterator<Item = Option<f64>>,
{
    let closes: Vec<f64> = raw_closes
        .into_iter()
        .flatten()
        .filter(|c| c.is_finite())
        .collect();
    if closes.len() < MIN_CLOSES {
        return MarketSignal::error(ticker, ERR_INSUFFICIENT);
    }

    let returns = daily_returns(&closes);
    let daily_vol = std_dev(tail(&returns, VOL_WINDOW));
    let last_move = returns.last().copied();
    let last_move_z = match (last_move, daily_vol) {
        (Some(m), Some(v)) if v > 0.0 => Some(m / v),
        _ => None,
    };

    let last_close = closes[closes.len() - 1];
    let recent_high = tail(&closes, DRAWDOWN_WINDOW)
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let drawdown = recent_high
        .is_finite()
        .then(|| last_close / recent_high - 1.0);

    MarketSignal::Ok(SignalSnapshot {
        ticker: ticker.to_string(),
        last_close,
        ret_1d: window_return(&closes, 1),
        ret_5d: window_return(&closes, 5),
        ret_1m: window_return(&closes, 21),
        ret_3m: window_return(&closes, 63),
        daily_vol_60d: daily_vol,
        last_move_z,
        drawdown_from_90d_high: drawdown,
    })
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("market_signals_total", "Market signals computed successfully.");
        describe_counter!("market_signal_errors_total", "Instruments that produced an error signal.");
    });
}

/// Fetches price history per instrument and turns it into signals.
#[derive(Clone)]
pub struct SignalEngine {
    source: Arc<dyn PriceSource>,
    history_days: u32,
    concurrency: usize,
}

impl SignalEngine {
    pub fn new(source: Arc<dyn PriceSource>, history_days: u32) -> Self {
        Self {
            source,
            history_days,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Signal for one ticker over `[now - 2*history_days, now]`.
    pub async fn signal_for(&self, ticker: &str, now: DateTime<Utc>) -> MarketSignal {
        ensure_metrics_described();
        let end = now.date_naive();
        let start = end
            .checked_sub_signed(Duration::days(2 * i64::from(self.history_days)))
            .unwrap_or(NaiveDate::MIN);

        let signal = match self.source.daily_history(ticker, start, end).await {
            Ok(Some(h)) if !h.is_empty() => compute_signal(ticker, h.closes()),
            Ok(_) => MarketSignal::error(ticker, ERR_NO_DATA),
            Err(e) => {
                tracing::warn!(error = %e, ticker, source = self.source.name(), "price history fetch failed");
                MarketSignal::error(ticker, format!("fetch failed: {e}"))
            }
        };

        if signal.is_error() {
            counter!("market_signal_errors_total").increment(1);
        } else {
            counter!("market_signals_total").increment(1);
        }
        signal
    }

    /// Signals for several tickers, one result per ticker in input order.
    /// A failing or panicking fetch only affects its own entry.
    pub async fn signals_for(&self, tickers: &[String], now: DateTime<Utc>) -> Vec<MarketSignal> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tickers.len());
        for t in tickers {
            let engine = self.clone();
            let sem = Arc::clone(&sem);
            let ticker = t.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                engine.signal_for(&ticker, now).await
            }));
        }

        let mut out = Vec::with_capacity(tickers.len());
        for (ticker, handle) in tickers.iter().zip(handles) {
            match handle.await {
                Ok(sig) => out.push(sig),
                Err(e) => {
                    tracing::warn!(error = %e, ticker = %ticker, "signal task failed");
                    counter!("market_signal_errors_total").increment(1);
                    out.push(MarketSignal::error(ticker, format!("task failed: {e}")));
                }
            }
        }
        out
    }

    /// One bundle per theme, over the theme's merged instrument list.
    pub async fn bundle_themes(&self, themes: &[Theme], now: DateTime<Utc>) -> Vec<ThemeSignalBundle> {
        let mut out = Vec::with_capacity(themes.len());
        for theme in themes {
            let tickers = theme.all_instruments();
            let signals = self.signals_for(&tickers, now).await;
            tracing::info!(
                theme = %theme.name,
                instruments = tickers.len(),
                errors = signals.iter().filter(|s| s.is_error()).count(),
                "theme signals computed"
            );
            out.push(ThemeSignalBundle {
                theme: theme.clone(),
                sentiment: theme.sentiment,
                signals,
            });
        }
        out
    }
}
