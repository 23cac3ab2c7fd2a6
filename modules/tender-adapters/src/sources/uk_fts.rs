use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tender_common::{CrawlError, CrawlResult, TenderRecord, TenderStatus};
use tender_relevance::CpvClassifier;

use crate::adapter::{AdapterContext, SourceAdapter};
use crate::chain::FallbackChain;
use crate::http::HttpSession;
use crate::normalize::{first_str, parse_amount, parse_date};
use crate::pagination::{paginate, Page, PaginationPolicy};
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

use super::keyword_or_healthcare;

pub const UK_FTS_ID: &str = "UK_FTS";

const FIND_TENDER_BASE_URL: &str = "https://www.find-tender.service.gov.uk";
const CONTRACTS_FINDER_BASE_URL: &str = "https://www.contractsfinder.service.gov.uk";
const PAGE_SIZE: usize = 100;
const LOOKBACK_DAYS: i64 = 30;

/// UK Find a Tender Service, read through its OCDS release API. Contracts
/// Finder's OCDS search serves as the backup path.
///
/// API docs: https://www.find-tender.service.gov.uk/Developer/Documentation
/// Auth: none
pub struct UkFtsAdapter {
    find_tender_url: String,
    contracts_finder_url: String,
    context: AdapterContext,
    limiter: Arc<HostRateLimiter>,
    classifier: CpvClassifier,
}

impl UkFtsAdapter {
    pub fn new(context: AdapterContext) -> Self {
        Self {
            find_tender_url: FIND_TENDER_BASE_URL.to_string(),
            contracts_finder_url: CONTRACTS_FINDER_BASE_URL.to_string(),
            context,
            limiter: Arc::new(HostRateLimiter::new(Duration::from_secs(1))),
            classifier: CpvClassifier::new(),
        }
    }

    /// Point both strategies at one test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.contracts_finder_url = base_url.clone();
        self.find_tender_url = base_url;
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.limiter = Arc::new(HostRateLimiter::new(interval));
        self
    }

    async fn ocds_api(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
    ) -> CrawlResult<Vec<TenderRecord>> {
        let now = Utc::now();
        let window = (
            (now - chrono::Duration::days(LOOKBACK_DAYS))
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        );
        let window = &window;
        let url = format!(
            "{}/api/1.0/ocdsReleasePackages",
            self.find_tender_url.trim_end_matches('/')
        );
        let url = url.as_str();

        let releases = paginate(UK_FTS_ID, PaginationPolicy::new(PAGE_SIZE), move |page| {
            let request = session
                .get(url)
                .query(&[
                    ("updatedFrom", window.0.as_str()),
                    ("updatedTo", window.1.as_str()),
                    ("stages", "tender"),
                ])
                .query(&[("limit", page.size), ("offset", page.offset)]);
            async move {
                let body = session.json(request).await?;
                Ok(Page::new(releases_of(&body)?, None))
            }
        })
        .await?;

        Ok(self.filter(tagger, &releases, FIND_TENDER_BASE_URL, "Notice"))
    }

    async fn contracts_finder(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
    ) -> CrawlResult<Vec<TenderRecord>> {
        let now = Utc::now();
        let from = (now - chrono::Duration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let url = format!(
            "{}/Published/Notices/OCDS/Search",
            self.contracts_finder_url.trim_end_matches('/')
        );

        let request = session.get(&url).query(&[
            ("publishedFrom", from.as_str()),
            ("stages", "tender"),
            ("limit", "100"),
        ]);
        let body = session.json(request).await?;
        let releases = releases_of(&body)?;

        Ok(self.filter(tagger, &releases, CONTRACTS_FINDER_BASE_URL, "notice"))
    }

    fn filter(
        &self,
        tagger: &RecordTagger,
        releases: &[Value],
        site: &str,
        notice_path: &str,
    ) -> Vec<TenderRecord> {
        let records = releases
            .iter()
            .filter_map(|release| release_to_record(release, site, notice_path))
            .collect();
        tagger.tag_all(records, true, |record| {
            keyword_or_healthcare(tagger, &self.classifier, record)
        })
    }
}

fn releases_of(body: &Value) -> CrawlResult<Vec<Value>> {
    ["releases", "notices", "results"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .cloned()
        .ok_or_else(|| CrawlError::malformed(UK_FTS_ID, "no releases in response"))
}

fn cpv_codes(release: &Value) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    codes.extend(first_str(release, &["/tender/classification/id"]));

    let items = release
        .pointer("/tender/items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in items {
        codes.extend(first_str(item, &["/classification/id"]));
        let additional = item
            .get("additionalClassifications")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        codes.extend(
            additional
                .iter()
                .filter(|c| first_str(c, &["scheme"]).is_some_and(|s| s.eq_ignore_ascii_case("CPV")))
                .filter_map(|c| first_str(c, &["id"])),
        );
    }

    let mut seen = std::collections::HashSet::new();
    codes.retain(|code| seen.insert(code.clone()));
    codes
}

fn buyer_name(release: &Value) -> Option<String> {
    first_str(release, &["/buyer/name"]).or_else(|| {
        release
            .get("parties")?
            .as_array()?
            .iter()
            .find(|party| {
                party
                    .get("roles")
                    .and_then(Value::as_array)
                    .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some("buyer")))
            })
            .and_then(|party| first_str(party, &["name"]))
    })
}

fn release_status(release: &Value) -> TenderStatus {
    let awarded = release
        .get("awards")
        .and_then(Value::as_array)
        .is_some_and(|awards| !awards.is_empty());
    if awarded {
        return TenderStatus::Awarded;
    }
    match first_str(release, &["/tender/status"])
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("cancelled" | "withdrawn") => TenderStatus::Cancelled,
        Some("complete" | "unsuccessful") => TenderStatus::Closed,
        _ => TenderStatus::Active,
    }
}

/// Map one OCDS release to a record. `notice_path` is the site's notice
/// route (`Notice` on Find a Tender, `notice` on Contracts Finder).
fn release_to_record(release: &Value, site: &str, notice_path: &str) -> Option<TenderRecord> {
    let id = first_str(release, &["ocid", "id"]);
    let url = id
        .as_ref()
        .map(|id| format!("{site}/{notice_path}/{id}"))
        .unwrap_or_default();
    let currency =
        first_str(release, &["/tender/value/currency"]).unwrap_or_else(|| "GBP".to_string());

    let mut record = TenderRecord::new(
        UK_FTS_ID,
        first_str(release, &["/tender/title", "title"]).unwrap_or_default(),
    )
    .with_url(url)
    .with_organization(buyer_name(release).unwrap_or_default())
    .with_locale("GB", &currency)
    .with_payload(release.clone());
    if let Some(id) = id {
        record = record.with_source_id(id);
    }
    if let Some(description) = first_str(release, &["/tender/description", "description"]) {
        record = record.with_description(description);
    }
    record.announcement_date =
        first_str(release, &["date", "publishedDate"]).and_then(|d| parse_date(&d));
    record.deadline_date = first_str(release, &["/tender/tenderPeriod/endDate", "closingDate"])
        .and_then(|d| parse_date(&d));
    record.estimated_value = parse_amount(release.pointer("/tender/value/amount"))
        .or_else(|| parse_amount(release.pointer("/planning/budget/amount/amount")));
    record.cpv_codes = cpv_codes(release);
    record.status = release_status(release);
    record.language = Some("en".to_string());

    record.has_identity().then_some(record)
}

#[async_trait]
impl SourceAdapter for UkFtsAdapter {
    async fn authenticate(&self) -> bool {
        true
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        let session = self.context.open_session(&self.limiter)?;
        let tagger = self.context.tagger(keywords);

        FallbackChain::new(UK_FTS_ID)
            .strategy("ocds_api", self.ocds_api(&session, &tagger))
            .strategy("contracts_finder", self.contracts_finder(&session, &tagger))
            .run()
            .await
    }

    fn supports_native_query(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        UK_FTS_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn release() -> Value {
        json!({
            "ocid": "ocds-h6vhtk-045a1b",
            "date": "2024-03-04T09:00:00Z",
            "buyer": {"name": "NHS Supply Chain"},
            "tender": {
                "title": "In vitro diagnostic analysers",
                "description": "Framework for pathology laboratories",
                "status": "active",
                "value": {"amount": 5000000, "currency": "GBP"},
                "tenderPeriod": {"endDate": "2024-04-15T12:00:00Z"},
                "classification": {"scheme": "CPV", "id": "33124110"},
                "items": [{
                    "classification": {"scheme": "CPV", "id": "33124110"},
                    "additionalClassifications": [
                        {"scheme": "CPV", "id": "33696500"},
                        {"scheme": "UNSPSC", "id": "41116000"}
                    ]
                }]
            }
        })
    }

    #[test]
    fn maps_ocds_release() {
        let record = release_to_record(&release(), FIND_TENDER_BASE_URL, "Notice").unwrap();
        assert_eq!(record.source_id.as_deref(), Some("ocds-h6vhtk-045a1b"));
        assert_eq!(record.organization, "NHS Supply Chain");
        assert_eq!(record.cpv_codes, vec!["33124110", "33696500"]);
        assert_eq!(record.estimated_value, Some(5_000_000.0));
        assert_eq!(
            record.source_url,
            "https://www.find-tender.service.gov.uk/Notice/ocds-h6vhtk-045a1b"
        );
        assert_eq!(record.status, TenderStatus::Active);
    }

    #[test]
    fn buyer_falls_back_to_parties_and_awards_win() {
        let release = json!({
            "id": "r-1",
            "tender": {"title": "Reagents", "status": "active"},
            "parties": [
                {"name": "Supplier Ltd", "roles": ["supplier"]},
                {"name": "Leeds Teaching Hospitals", "roles": ["buyer", "procuringEntity"]}
            ],
            "awards": [{"id": "a-1"}]
        });
        let record = release_to_record(&release, CONTRACTS_FINDER_BASE_URL, "notice").unwrap();
        assert_eq!(record.organization, "Leeds Teaching Hospitals");
        assert_eq!(record.status, TenderStatus::Awarded);
    }

    #[test]
    fn response_without_releases_is_malformed() {
        assert!(releases_of(&json!({"links": {}})).is_err());
        assert_eq!(releases_of(&json!({"releases": []})).unwrap().len(), 0);
    }
}
