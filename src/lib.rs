// src/lib.rs
//! News link ingestion and market-signal pipeline that classifies whether a
//! theme's narrative already looks priced in.

pub mod cache;
pub mod classify;
pub mod config;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod market;
pub mod narrative;
pub mod pipeline;
pub mod sentiment;
pub mod telemetry;
pub mod themes;

// ---- Re-exports for stable public API ----
pub use crate::cache::Cache;
pub use crate::classify::{classify, SignalThresholds, Verdict};
pub use crate::config::Config;
pub use crate::ingest::types::LinkItem;
pub use crate::market::{MarketSignal, SignalSnapshot};
pub use crate::pipeline::{Pipeline, RunOutcome};
