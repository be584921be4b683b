// src/narrative.rs
//! Narrative verdicts: per-instrument heuristics plus an external analyst
//! (normally an LLM) that writes the free-text reasoning. When the analyst
//! fails the run keeps going with a heuristic-only fallback.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, SignalThresholds, Verdict};
use crate::market::MarketSignal;
use crate::themes::{Theme, ThemeSignalBundle};

pub const FALLBACK_NOTE: &str = "Narrative analysis failed; using heuristic only.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicVerdict {
    pub ticker: String,
    pub heuristic_verdict: Verdict,
    pub signals: MarketSignal,
}

/// Everything the analyst sees for one theme.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeInput<'a> {
    pub theme: &'a str,
    pub description: &'a str,
    pub sentiment: f64,
    pub signals: &'a [MarketSignal],
    pub heuristic: &'a [HeuristicVerdict],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeVerdict {
    pub verdict: String,
    #[serde(default)]
    pub reasoning_bullets: Vec<String>,
}

impl NarrativeVerdict {
    pub fn fallback() -> Self {
        Self {
            verdict: Verdict::MixedUnclear.as_str().to_string(),
            reasoning_bullets: vec![FALLBACK_NOTE.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeAssessment {
    pub theme: Theme,
    pub sentiment: f64,
    pub signals: Vec<MarketSignal>,
    pub heuristic: Vec<HeuristicVerdict>,
    pub narrative: NarrativeVerdict,
}

#[async_trait]
pub trait NarrativeAnalyst: Send + Sync {
    async fn priced_in_analysis(&self, input: &NarrativeInput<'_>) -> Result<NarrativeVerdict>;
    fn name(&self) -> &'static str;
}

/// Always fails; every theme gets the heuristic-only fallback.
pub struct DisabledAnalyst;

#[async_trait]
impl NarrativeAnalyst for DisabledAnalyst {
    async fn priced_in_analysis(&self, _input: &NarrativeInput<'_>) -> Result<NarrativeVerdict> {
        Err(anyhow!("narrative analyst disabled"))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "narrative_fallback_total",
            "Themes that fell back to the heuristic-only verdict."
        );
    });
}

/// Heuristic verdict for every instrument of a bundle, in signal order.
pub fn heuristic_verdicts(bundle: &ThemeSignalBundle, th: &SignalThresholds) -> Vec<HeuristicVerdict> {
    bundle
        .signals
        .iter()
        .map(|sig| HeuristicVerdict {
            ticker: sig.ticker().to_string(),
            heuristic_verdict: classify(bundle.sentiment, sig, th),
            signals: sig.clone(),
        })
        .collect()
}

pub async fn assess_bundle(
    bundle: ThemeSignalBundle,
    th: &SignalThresholds,
    analyst: &dyn NarrativeAnalyst,
) -> ThemeAssessment {
    ensure_metrics_described();
    let heuristic = heuristic_verdicts(&bundle, th);

    let input = NarrativeInput {
        theme: &bundle.theme.name,
        description: &bundle.theme.description,
        sentiment: bundle.sentiment,
        signals: &bundle.signals,
        heuristic: &heuristic,
    };
    let narrative = match analyst.priced_in_analysis(&input).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, analyst = analyst.name(), theme = %bundle.theme.name, "narrative fallback");
            counter!("narrative_fallback_total").increment(1);
            NarrativeVerdict::fallback()
        }
    };

    ThemeAssessment {
        theme: bundle.theme,
        sentiment: bundle.sentiment,
        signals: bundle.signals,
        heuristic,
        narrative,
    }
}

pub async fn assess_all(
    bundles: Vec<ThemeSignalBundle>,
    th: &SignalThresholds,
    analyst: &dyn NarrativeAnalyst,
) -> Vec<ThemeAssessment> {
    let mut out = Vec::with_capacity(bundles.len());
    for b in bundles {
        out.push(assess_bundle(b, th, analyst).await);
    }
    out
}
