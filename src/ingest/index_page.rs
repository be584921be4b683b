// src/ingest/index_page.rs
use scraper::{Html, Selector};
use url::Url;

use crate::ingest::types::{LinkItem, SourceError};
use crate::ingest::KeywordFilter;

/// Anchors with shorter text ("Home", "More", icons) are navigation, not articles.
pub const MIN_ANCHOR_TEXT_LEN: usize = 8;

/// Extract candidate article links from an index page.
pub fn parse_index(
    html: &str,
    index_url: &str,
    site_name: &str,
    filter: &KeywordFilter,
) -> Result<Vec<LinkItem>, SourceError> {
    let base = Url::parse(index_url).map_err(|e| SourceError::ParseFailed {
        url: index_url.to_string(),
        message: format!("invalid index url: {e}"),
    })?;
    let selector = Selector::parse("a[href]").map_err(|e| SourceError::ParseFailed {
        url: index_url.to_string(),
        message: format!("selector: {e:?}"),
    })?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for a in document.select(&selector) {
        let href = a.value().attr("href").unwrap_or_default().trim();
        let title = a
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if href.is_empty() || title.chars().count() < MIN_ANCHOR_TEXT_LEN {
            continue;
        }
        let Some(url) = resolve_http(&base, href) else {
            continue;
        };
        if !filter.passes(&title, &url) {
            continue;
        }
        out.push(LinkItem {
            title,
            url,
            published: None,
            source: index_url.to_string(),
            site_name: site_name.to_string(),
        });
    }
    Ok(out)
}

/// Resolve `href` against the page URL; only absolute http(s) results survive.
fn resolve_http(base: &Url, href: &str) -> Option<String> {
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
