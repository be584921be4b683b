// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::FetchError;

/// Site name given to every item that came from an RSS feed.
pub const RSS_SITE_NAME: &str = "RSS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkItem {
    pub title: String,
    pub url: String,
    /// `None` when the source gave no date or it could not be parsed.
    pub published: Option<DateTime<Utc>>,
    /// Feed or index page the link was discovered on.
    pub source: String,
    pub site_name: String,
}

/// One configured source, in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Feed { url: String },
    IndexPage { url: String, site_name: String },
}

impl SourceSpec {
    pub fn url(&self) -> &str {
        match self {
            SourceSpec::Feed { url } | SourceSpec::IndexPage { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Feed { .. } => "rss",
            SourceSpec::IndexPage { .. } => "index",
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),
    #[error("parse failed for {url}: {message}")]
    ParseFailed { url: String, message: String },
}
