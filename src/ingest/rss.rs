// src/ingest/rss.rs
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::ingest::types::{LinkItem, SourceError, RSS_SITE_NAME};
use crate::ingest::{normalize_title, parse_published, KeywordFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Published,
}

impl Field {
    /// Matches on the local name, so `dc:date` and `date` are the same field.
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" | b"date" => Some(Field::Published),
            _ => None,
        }
    }
}

/// Text of the first non-empty child per field; later repeats are ignored.
#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
}

impl RawItem {
    fn set_once(&mut self, field: Field, text: String) {
        if text.trim().is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
        };
        slot.get_or_insert(text);
    }
}

/// Every `item` element anywhere in the document, in document order.
/// Works for RSS 2.0 (`channel > item`) and RSS 1.0/RDF (items beside the channel).
fn scan_items(xml: &str) -> Result<Vec<RawItem>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut depth = 0usize;
    // (item, depth of its start tag)
    let mut current: Option<(RawItem, usize)> = None;
    // (field, depth of its start tag, accumulated text)
    let mut field: Option<(Field, usize, String)> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(format!("at byte {}: {e}", reader.buffer_position())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.local_name();
                match current.as_ref().map(|(_, d)| *d) {
                    None if name.as_ref() == b"item" => current = Some((RawItem::default(), depth)),
                    Some(item_depth) if field.is_none() && depth == item_depth + 1 => {
                        field = Field::from_local_name(name.as_ref()).map(|f| (f, depth, String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, d, buf)) = field.as_mut() {
                    if *d == depth {
                        let text = t
                            .unescape()
                            .map(|c| c.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                        buf.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, d, buf)) = field.as_mut() {
                    if *d == depth {
                        buf.push_str(&String::from_utf8_lossy(&c));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if field.as_ref().is_some_and(|(_, d, _)| *d == depth) {
                    if let (Some((f, _, text)), Some((item, _))) = (field.take(), current.as_mut()) {
                        item.set_once(f, text);
                    }
                }
                if current.as_ref().is_some_and(|(_, d)| *d == depth) {
                    if let Some((item, _)) = current.take() {
                        items.push(item);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(_) => {}
        }
    }

    if depth != 0 {
        return Err(format!("document ended with {depth} unclosed element(s)"));
    }
    Ok(items)
}

/// Parse an RSS document into link items that pass `filter`.
/// Items without a link are skipped; undated or badly dated items keep `published: None`.
pub fn parse_feed(
    xml: &str,
    feed_url: &str,
    filter: &KeywordFilter,
) -> Result<Vec<LinkItem>, SourceError> {
    let raw = scan_items(xml).map_err(|message| SourceError::ParseFailed {
        url: feed_url.to_string(),
        message,
    })?;

    let mut out = Vec::with_capacity(raw.len());
    for it in raw {
        let title = normalize_title(it.title.as_deref().unwrap_or_default());
        let link = it.link.as_deref().unwrap_or_default().trim().to_string();
        if link.is_empty() || !filter.passes(&title, &link) {
            continue;
        }
        out.push(LinkItem {
            title,
            url: link,
            published: it.published.as_deref().and_then(parse_published),
            source: feed_url.to_string(),
            site_name: RSS_SITE_NAME.to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Markets</title>
    <link>https://example.test/</link>
    <item>
      <title>Chip stocks rally on AI demand&nbsp;surge</title>
      <link>https://example.test/a</link>
      <pubDate>Mon, 19 Oct 2026 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>No link here</title>
    </item>
    <item>
      <title>Oil slips after inventory build</title>
      <link> https://example.test/b </link>
      <pubDate>sometime last week</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_keeps_undated() {
        let items = parse_feed(FEED, "https://example.test/feed", &KeywordFilter::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Chip stocks rally on AI demand surge");
        assert!(items[0].published.is_some());
        assert_eq!(items[1].url, "https://example.test/b");
        assert_eq!(items[1].published, None);
        assert!(items.iter().all(|i| i.site_name == RSS_SITE_NAME));
    }

    #[test]
    fn keyword_filter_applies_to_feed_items() {
        let f = KeywordFilter::new(&["oil".into()], &[]);
        let items = parse_feed(FEED, "https://example.test/feed", &f).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.test/b");
    }

    #[test]
    fn malformed_xml_is_parse_failure() {
        let r = parse_feed("<rss><channel>", "u", &KeywordFilter::default());
        assert!(matches!(r, Err(SourceError::ParseFailed { .. })));
    }

    #[test]
    fn atom_link_inside_item_does_not_break_the_feed() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
          <item>
            <title>Chip stocks rally</title>
            <link>https://example.test/a</link>
            <atom:link href="https://example.test/a/amp" rel="amphtml"/>
            <link>https://example.test/a-duplicate</link>
          </item>
          <item><title>Second story here</title><link>https://example.test/b</link></item>
        </channel></rss>"#;
        let items = parse_feed(xml, "u", &KeywordFilter::default()).unwrap();
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.test/a", "https://example.test/b"]);
    }

    #[test]
    fn items_interleaved_with_other_elements_are_all_kept() {
        let xml = r#"<rss><channel>
          <item><title>First headline</title><link>https://example.test/1</link></item>
          <image><url>https://example.test/logo.png</url><title>Logo</title><link>https://example.test/</link></image>
          <item><title>Second headline</title><link>https://example.test/2</link></item>
        </channel></rss>"#;
        let items = parse_feed(xml, "u", &KeywordFilter::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].url, "https://example.test/2");
        assert_eq!(items[1].title, "Second headline");
    }

    #[test]
    fn rdf_items_beside_the_channel_are_found() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.test/"><title>Desk</title><link>https://example.test/</link></channel>
  <item rdf:about="https://example.test/r1">
    <title><![CDATA[Fed holds rates & signals patience]]></title>
    <link>https://example.test/r1</link>
    <dc:date>2026-10-18T10:00:00Z</dc:date>
  </item>
  <item rdf:about="https://example.test/r2">
    <title>Oil slips</title>
    <link>https://example.test/r2</link>
  </item>
</rdf:RDF>"#;
        let items = parse_feed(xml, "u", &KeywordFilter::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Fed holds rates & signals patience");
        assert!(items[0].published.is_some());
        assert_eq!(items[1].published, None);
    }

    #[test]
    fn escaped_entities_in_links_are_decoded() {
        let xml = r#"<rss><channel><item><title>Q&amp;A with the chair</title>
          <link>https://example.test/s?id=1&amp;ref=rss</link></item></channel></rss>"#;
        let items = parse_feed(xml, "u", &KeywordFilter::default()).unwrap();
        assert_eq!(items[0].url, "https://example.test/s?id=1&ref=rss");
        assert_eq!(items[0].title, "Q&A with the chair");
    }

    #[test]
    fn empty_channel_yields_no_items() {
        let xml = r#"<rss><channel><title>t</title></channel></rss>"#;
        let items = parse_feed(xml, "u", &KeywordFilter::default()).unwrap();
        assert!(items.is_empty());
    }
}
