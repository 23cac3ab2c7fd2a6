//! RSS/Atom feed retrieval for feed-based strategies.

use chrono::{DateTime, Utc};
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use tender_common::{CrawlError, CrawlResult};

use crate::http::HttpSession;
use crate::normalize::clean_text;

/// Feeds checked at once by `fetch_feeds`.
pub const MAX_CONCURRENT_FEEDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

/// Parse an RSS/Atom/JSON feed body into entries. Entries without a title
/// and a link are dropped.
pub fn parse_feed(bytes: &[u8], source: &str) -> CrawlResult<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| CrawlError::malformed(source, e))?;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));
            let title = entry
                .title
                .map(|t| clean_text(&t.content))
                .unwrap_or_default();
            if title.is_empty() && link.is_none() {
                return None;
            }

            Some(FeedEntry {
                id: entry.id,
                title,
                link,
                summary: entry.summary.map(|s| clean_text(&s.content)),
                published: entry.published.or(entry.updated),
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
            })
        })
        .collect();

    Ok(entries)
}

pub async fn fetch_feed(session: &HttpSession, url: &str) -> CrawlResult<Vec<FeedEntry>> {
    let bytes = session.bytes(session.get(url)).await?;
    let entries = parse_feed(&bytes, url)?;
    tracing::debug!(url, entries = entries.len(), "Feed parsed");
    Ok(entries)
}

/// Fetch several feeds with bounded concurrency. Results keep the order of
/// `urls`.
pub async fn fetch_feeds(
    session: &HttpSession,
    urls: &[String],
) -> Vec<(String, CrawlResult<Vec<FeedEntry>>)> {
    let checks: Vec<_> = urls
        .iter()
        .map(|url| async move { (url.clone(), fetch_feed(session, url).await) }.boxed())
        .collect();
    stream::iter(checks)
        .buffered(MAX_CONCURRENT_FEEDS)
        .collect()
        .await
}
