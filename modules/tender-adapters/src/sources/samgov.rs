use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tender_common::{CrawlError, CrawlResult, TenderRecord, TenderStatus};

use crate::adapter::{AdapterContext, SourceAdapter};
use crate::chain::{merge_sub_fetches, FallbackChain};
use crate::http::HttpSession;
use crate::normalize::{as_count, first_str, item_list, parse_amount, parse_date};
use crate::pagination::{paginate, Page, PaginationPolicy};
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

pub const SAMGOV_ID: &str = "SAM.gov";

const DEFAULT_BASE_URL: &str = "https://api.sam.gov/opportunities/v2/search";
const PAGE_SIZE: usize = 100;
const LOOKBACK_DAYS: i64 = 30;

/// US federal contract opportunities (SAM.gov Get Opportunities API v2).
///
/// The API searches by keyword, so each seed keyword is one paginated query
/// and results are tagged without local filtering.
///
/// API docs: https://open.gsa.gov/api/get-opportunities-public-api/
/// Auth: API key (SAMGOV_API_KEY)
/// Rate limit: one request per second
pub struct SamGovAdapter {
    api_key: Option<String>,
    base_url: String,
    context: AdapterContext,
    limiter: Arc<HostRateLimiter>,
}

impl SamGovAdapter {
    pub fn new(api_key: Option<String>, context: AdapterContext) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            context,
            limiter: Arc::new(HostRateLimiter::new(Duration::from_secs(1))),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.limiter = Arc::new(HostRateLimiter::new(interval));
        self
    }

    async fn opportunities_api(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
        keywords: &[String],
    ) -> CrawlResult<Vec<TenderRecord>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CrawlError::AuthenticationUnavailable {
                adapter: SAMGOV_ID.to_string(),
            })?;

        let now = Utc::now();
        let window = (
            (now - chrono::Duration::days(LOOKBACK_DAYS))
                .format("%m/%d/%Y")
                .to_string(),
            now.format("%m/%d/%Y").to_string(),
        );

        let mut fetched = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let result = self.search(session, api_key, keyword, &window).await;
            fetched.push((keyword.clone(), result));
        }
        let items = merge_sub_fetches(SAMGOV_ID, fetched)?;

        let records: Vec<TenderRecord> = items.iter().filter_map(to_record).collect();
        Ok(tagger.tag_all(records, false, |_| true))
    }

    async fn search(
        &self,
        session: &HttpSession,
        api_key: &str,
        keyword: &str,
        window: &(String, String),
    ) -> CrawlResult<Vec<Value>> {
        let url = self.base_url.as_str();

        paginate(SAMGOV_ID, PaginationPolicy::new(PAGE_SIZE), move |page| {
            let request = session
                .get(url)
                .header("X-API-Key", api_key)
                .query(&[
                    ("api_key", api_key),
                    ("keyword", keyword),
                    ("postedFrom", window.0.as_str()),
                    ("postedTo", window.1.as_str()),
                ])
                .query(&[("limit", page.size), ("offset", page.offset)]);
            async move {
                let body = session.json(request).await?;
                let items = body
                    .get("opportunitiesData")
                    .map(item_list)
                    .ok_or_else(|| CrawlError::malformed(SAMGOV_ID, "missing opportunitiesData"))?;
                Ok(Page::new(items, as_count(body.get("totalRecords"))))
            }
        })
        .await
    }
}

fn to_record(item: &Value) -> Option<TenderRecord> {
    let notice_id = first_str(item, &["noticeId"]);
    let url = first_str(item, &["uiLink"])
        .or_else(|| notice_id.as_ref().map(|id| format!("https://sam.gov/opp/{id}/view")))
        .unwrap_or_default();

    let mut record = TenderRecord::new(SAMGOV_ID, first_str(item, &["title"]).unwrap_or_default())
        .with_url(url)
        .with_organization(
            first_str(item, &["fullParentPathName", "organizationName", "department"])
                .unwrap_or_default(),
        )
        .with_locale("US", "USD")
        .with_payload(item.clone());
    if let Some(id) = notice_id {
        record = record.with_source_id(id);
    }
    // The description field holds a link to the full text, not the text.
    if let Some(description) = first_str(item, &["description"]).filter(|d| !d.starts_with("http")) {
        record = record.with_description(description);
    }
    record.announcement_date = first_str(item, &["postedDate"]).and_then(|d| parse_date(&d));
    record.deadline_date =
        first_str(item, &["responseDeadLine", "responseDeadline"]).and_then(|d| parse_date(&d));
    record.estimated_value = parse_amount(item.pointer("/award/amount"));
    if first_str(item, &["active"]).is_some_and(|active| active.eq_ignore_ascii_case("no")) {
        record.status = TenderStatus::Closed;
    }
    record.language = Some("en".to_string());

    record.has_identity().then_some(record)
}

#[async_trait]
impl SourceAdapter for SamGovAdapter {
    async fn authenticate(&self) -> bool {
        if self.api_key.is_some() {
            return true;
        }
        tracing::warn!(adapter = SAMGOV_ID, "SAMGOV_API_KEY not set, running without credentials");
        false
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        let session = self.context.open_session(&self.limiter)?;
        let tagger = self.context.tagger(keywords);

        FallbackChain::new(SAMGOV_ID)
            .strategy(
                "opportunities_api",
                self.opportunities_api(&session, &tagger, keywords),
            )
            .run()
            .await
    }

    fn supports_native_query(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        SAMGOV_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_record_from_opportunity() {
        let item = json!({
            "noticeId": "abc123",
            "title": "Molecular Diagnostic Test Kits",
            "fullParentPathName": "HEALTH AND HUMAN SERVICES, DEPARTMENT OF",
            "postedDate": "2024-03-01",
            "responseDeadLine": "2024-03-20T17:00:00-04:00",
            "description": "https://api.sam.gov/prod/opportunities/v1/noticedesc?noticeid=abc123",
            "active": "Yes",
            "award": {"amount": "250000"}
        });

        let record = to_record(&item).unwrap();
        assert_eq!(record.source_id.as_deref(), Some("abc123"));
        assert_eq!(record.source_url, "https://sam.gov/opp/abc123/view");
        assert_eq!(record.currency, "USD");
        assert!(record.description.is_none());
        assert_eq!(record.estimated_value, Some(250_000.0));
        assert_eq!(record.status, TenderStatus::Active);
    }

    #[test]
    fn inactive_opportunity_is_closed() {
        let item = json!({"noticeId": "x", "title": "Reagents", "active": "No"});
        assert_eq!(to_record(&item).unwrap().status, TenderStatus::Closed);
    }
}
