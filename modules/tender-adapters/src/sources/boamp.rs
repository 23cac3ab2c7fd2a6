use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tender_common::{CrawlResult, TenderRecord};

use crate::adapter::{AdapterContext, SourceAdapter};
use crate::chain::{merge_sub_fetches, FallbackChain};
use crate::feed::{fetch_feeds, FeedEntry};
use crate::html::{extract_listing, ListingItem};
use crate::http::HttpSession;
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

pub const BOAMP_ID: &str = "BOAMP";

const DEFAULT_BASE_URL: &str = "https://www.boamp.fr";
const FEED_PATHS: [&str; 2] = ["/avis/rss", "/rss/boamp.xml"];
const MAX_SEARCH_KEYWORDS: usize = 3;
const MAX_RESULTS_PER_SEARCH: usize = 10;

/// Bulletin officiel des annonces des marchés publics (France).
///
/// Reads the public RSS feeds first; when they yield nothing, searches the
/// site for the first few keywords and scrapes the result listing.
///
/// Auth: none
/// Rate limit: one request every two seconds
pub struct BoampAdapter {
    base_url: String,
    context: AdapterContext,
    limiter: Arc<HostRateLimiter>,
}

impl BoampAdapter {
    pub fn new(context: AdapterContext) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            context,
            limiter: Arc::new(HostRateLimiter::new(Duration::from_secs(2))),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.limiter = Arc::new(HostRateLimiter::new(interval));
        self
    }

    async fn rss(&self, session: &HttpSession, tagger: &RecordTagger) -> CrawlResult<Vec<TenderRecord>> {
        let urls: Vec<String> = FEED_PATHS
            .iter()
            .map(|path| format!("{}{path}", self.base_url))
            .collect();
        let entries = merge_sub_fetches(BOAMP_ID, fetch_feeds(session, &urls).await)?;

        let records = entries.into_iter().map(entry_to_record).collect();
        Ok(tagger.tag_matching(records))
    }

    async fn search_page(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
        keywords: &[String],
    ) -> CrawlResult<Vec<TenderRecord>> {
        let url = format!("{}/avis", self.base_url);

        let mut fetched = Vec::new();
        for keyword in keywords.iter().take(MAX_SEARCH_KEYWORDS) {
            let request = session.get(&url).query(&[
                ("query", keyword.as_str()),
                ("type", "marches"),
                ("sort", "date_desc"),
            ]);
            let result = match session.text(request).await {
                Ok(html) => extract_listing(&html, &url, "article", "a[href]").map(|mut items| {
                    items.truncate(MAX_RESULTS_PER_SEARCH);
                    items
                }),
                Err(e) => Err(e),
            };
            fetched.push((keyword.clone(), result));
        }
        let items = merge_sub_fetches(BOAMP_ID, fetched)?;

        let records = items.into_iter().map(listing_to_record).collect();
        Ok(tagger.tag_matching(records))
    }
}

fn french(record: TenderRecord) -> TenderRecord {
    let mut record = record.with_locale("FR", "EUR");
    record.language = Some("fr".to_string());
    record
}

/// Notice ids are the last path segment of the notice URL.
fn notice_id(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains('.'))
        .map(String::from)
}

fn entry_to_record(entry: FeedEntry) -> TenderRecord {
    let link = entry.link.clone().unwrap_or_default();
    let source_id = if entry.id.is_empty() {
        notice_id(&link)
    } else {
        Some(entry.id.clone())
    };

    let mut record = french(TenderRecord::new(BOAMP_ID, entry.title.clone()).with_url(link));
    if let Some(id) = source_id {
        record = record.with_source_id(id);
    }
    if let Some(summary) = entry.summary.clone() {
        record = record.with_description(summary);
    }
    record.announcement_date = entry.published;
    record.cpv_codes = entry
        .categories
        .iter()
        .filter(|c| c.len() >= 8 && c.chars().take(8).all(|ch| ch.is_ascii_digit()))
        .cloned()
        .collect();
    record.raw_payload = serde_json::json!({
        "id": entry.id,
        "title": entry.title,
        "link": entry.link,
        "summary": entry.summary,
        "categories": entry.categories,
    });
    record
}

fn listing_to_record(item: ListingItem) -> TenderRecord {
    let mut record = french(
        TenderRecord::new(BOAMP_ID, item.title.clone()).with_url(item.url.clone()),
    );
    if let Some(id) = notice_id(&item.url) {
        record = record.with_source_id(id);
    }
    if item.summary != item.title {
        record = record.with_description(item.summary.clone());
    }
    record.raw_payload = serde_json::json!({
        "title": item.title,
        "url": item.url,
        "summary": item.summary,
    });
    record
}

#[async_trait]
impl SourceAdapter for BoampAdapter {
    async fn authenticate(&self) -> bool {
        true
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        let session = self.context.open_session(&self.limiter)?;
        let tagger = self.context.tagger(keywords);

        FallbackChain::new(BOAMP_ID)
            .strategy("rss", self.rss(&session, &tagger))
            .strategy("search_page", self.search_page(&session, &tagger, keywords))
            .run()
            .await
    }

    fn supports_native_query(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        BOAMP_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_id_is_last_segment() {
        assert_eq!(
            notice_id("https://www.boamp.fr/avis/detail/24-1001/"),
            Some("24-1001".to_string())
        );
        assert_eq!(notice_id("https://www.boamp.fr/rss/boamp.xml"), None);
    }

    #[test]
    fn feed_entry_keeps_cpv_categories_only() {
        let entry = FeedEntry {
            id: "24-1001".into(),
            title: "Fourniture de réactifs PCR".into(),
            link: Some("https://www.boamp.fr/avis/detail/24-1001".into()),
            summary: Some("Marché de réactifs".into()),
            published: None,
            categories: vec!["33696500".into(), "Fournitures".into()],
        };

        let record = entry_to_record(entry);
        assert_eq!(record.source_id.as_deref(), Some("24-1001"));
        assert_eq!(record.cpv_codes, vec!["33696500"]);
        assert_eq!(record.country, "FR");
        assert_eq!(record.language.as_deref(), Some("fr"));
    }
}
