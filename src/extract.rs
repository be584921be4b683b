// src/extract.rs
//! Article extraction and summarization seams. The real implementations
//! (readability extraction, LLM summaries) live outside this crate; the
//! defaults here keep an offline run working end to end.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::HttpFetcher;
use crate::ingest::types::LinkItem;

/// Body text is cut to this many characters.
pub const MAX_TEXT_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub site_name: String,
    pub published: Option<DateTime<Utc>>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// `Ok(None)` when the page has no usable body.
    async fn extract(&self, link: &LinkItem) -> Result<Option<Article>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, article: &Article) -> Result<Option<String>>;
}

/// Fetches the page and keeps the visible paragraph text.
pub struct HtmlTextExtractor {
    fetcher: Arc<dyn HttpFetcher>,
}

impl HtmlTextExtractor {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

/// Paragraph text of an HTML document, whitespace-collapsed. Falls back to
/// the whole body when the page has no `<p>` elements.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let collect = |sel: &str| -> String {
        let Ok(selector) = Selector::parse(sel) else {
            return String::new();
        };
        document
            .select(&selector)
            .flat_map(|el| el.text())
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    };

    let paragraphs = collect("p");
    let text = if paragraphs.is_empty() {
        collect("body")
    } else {
        paragraphs
    };
    text.chars().take(MAX_TEXT_CHARS).collect()
}

#[async_trait]
impl ArticleExtractor for HtmlTextExtractor {
    async fn extract(&self, link: &LinkItem) -> Result<Option<Article>> {
        let html = self.fetcher.get_text(&link.url).await?;
        let text = html_to_text(&html);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Article {
            url: link.url.clone(),
            title: link.title.clone(),
            site_name: link.site_name.clone(),
            published: link.published,
            text,
            summary: None,
        }))
    }
}

/// Leaves articles unsummarized.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _article: &Article) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_preferred_over_chrome() {
        let html = r#"<html><body><nav>Menu Login</nav>
            <p>First   paragraph.</p><div><p>Second <em>one</em>.</p></div></body></html>"#;
        assert_eq!(html_to_text(html), "First paragraph. Second one .");
    }

    #[test]
    fn body_fallback_and_empty() {
        assert_eq!(html_to_text("<body><div>Only div text</div></body>"), "Only div text");
        assert_eq!(html_to_text("<html><body></body></html>"), "");
    }
}
