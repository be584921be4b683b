// src/classify.rs
//! Priced-in heuristic: theme sentiment + one instrument's signals → `Verdict`.
//! Pure, no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::market::MarketSignal;

/// |sentiment| must exceed this before the signals are consulted at all.
pub const SENTIMENT_BAND: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "unknown (no market data)")]
    UnknownNoData,
    #[serde(rename = "likely priced in / crowded")]
    LikelyPricedIn,
    #[serde(rename = "possibly not priced in (market still skeptical)")]
    PossiblyNotPricedIn,
    #[serde(rename = "partially priced in")]
    PartiallyPricedIn,
    #[serde(rename = "negative priced in")]
    NegativePricedIn,
    #[serde(rename = "risk not fully priced in")]
    RiskNotFullyPricedIn,
    #[serde(rename = "mixed/unclear")]
    MixedUnclear,
}

impl Verdict {
    pub const ALL: [Verdict; 7] = [
        Verdict::UnknownNoData,
        Verdict::LikelyPricedIn,
        Verdict::PossiblyNotPricedIn,
        Verdict::PartiallyPricedIn,
        Verdict::NegativePricedIn,
        Verdict::RiskNotFullyPricedIn,
        Verdict::MixedUnclear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::UnknownNoData => "unknown (no market data)",
            Verdict::LikelyPricedIn => "likely priced in / crowded",
            Verdict::PossiblyNotPricedIn => "possibly not priced in (market still skeptical)",
            Verdict::PartiallyPricedIn => "partially priced in",
            Verdict::NegativePricedIn => "negative priced in",
            Verdict::RiskNotFullyPricedIn => "risk not fully priced in",
            Verdict::MixedUnclear => "mixed/unclear",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// 1-month return above which a bullish theme looks crowded.
    pub strong_move_1m: f64,
    /// 1-month return below which a bearish theme looks priced in.
    pub strong_drop_1m: f64,
    pub z_threshold: f64,
    /// Drawdown from the 90-day high below which the market is "still skeptical".
    pub drawdown_deep: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_move_1m: 0.08,
            strong_drop_1m: -0.08,
            z_threshold: 2.0,
            drawdown_deep: -0.15,
        }
    }
}

fn above(x: Option<f64>, t: f64) -> bool {
    x.is_some_and(|v| v > t)
}

fn below(x: Option<f64>, t: f64) -> bool {
    x.is_some_and(|v| v < t)
}

/// Decision table, first match wins. A null field never satisfies a condition.
pub fn classify(sentiment: f64, signal: &MarketSignal, th: &SignalThresholds) -> Verdict {
    let s = match signal {
        MarketSignal::Error { .. } => return Verdict::UnknownNoData,
        MarketSignal::Ok(s) => s,
    };

    if sentiment > SENTIMENT_BAND {
        if above(s.ret_1m, th.strong_move_1m) || above(s.last_move_z, th.z_threshold) {
            return Verdict::LikelyPricedIn;
        }
        if below(s.drawdown_from_90d_high, th.drawdown_deep) {
            return Verdict::PossiblyNotPricedIn;
        }
        return Verdict::PartiallyPricedIn;
    }

    if sentiment < -SENTIMENT_BAND {
        if below(s.ret_1m, th.strong_drop_1m) || below(s.last_move_z, -th.z_threshold) {
            return Verdict::NegativePricedIn;
        }
        return Verdict::RiskNotFullyPricedIn;
    }

    Verdict::MixedUnclear
}
