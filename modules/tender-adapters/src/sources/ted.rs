use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tender_common::{CrawlError, CrawlResult, TenderRecord};
use tender_relevance::CpvClassifier;

use crate::adapter::{AdapterContext, SourceAdapter};
use crate::chain::FallbackChain;
use crate::http::HttpSession;
use crate::normalize::{as_count, first_str, parse_amount, parse_date};
use crate::pagination::{paginate, Page, PaginationPolicy};
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

use super::keyword_or_healthcare;

pub const TED_ID: &str = "TED";

const DEFAULT_BASE_URL: &str = "https://ted.europa.eu/api/v3.0/notices/search";
const PAGE_SIZE: usize = 100;
const LOOKBACK_DAYS: i64 = 30;

/// Tenders Electronic Daily, the EU supplement to the Official Journal.
///
/// Searches recently published notices (newest first) and keeps those that
/// match a keyword or carry healthcare CPV codes.
///
/// API docs: https://ted.europa.eu/api/documentation
/// Auth: none
pub struct TedAdapter {
    base_url: String,
    context: AdapterContext,
    limiter: Arc<HostRateLimiter>,
    classifier: CpvClassifier,
}

impl TedAdapter {
    pub fn new(context: AdapterContext) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            context,
            limiter: Arc::new(HostRateLimiter::new(Duration::from_millis(500))),
            classifier: CpvClassifier::new(),
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

    async fn search_api(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
    ) -> CrawlResult<Vec<TenderRecord>> {
        let now = Utc::now();
        let published = format!(
            "[{} TO {}]",
            (now - chrono::Duration::days(LOOKBACK_DAYS)).format("%Y%m%d"),
            now.format("%Y%m%d")
        );
        let published = published.as_str();
        let url = self.base_url.as_str();

        let notices = paginate(TED_ID, PaginationPolicy::new(PAGE_SIZE), move |page| {
            let request = session
                .get(url)
                .query(&[
                    ("scope", "3"),
                    ("sortField", "PD"),
                    ("sortOrder", "desc"),
                    ("PD", published),
                ])
                .query(&[("pageSize", page.size), ("pageNum", page.number)]);
            async move {
                let body = session.json(request).await?;
                parse_page(&body)
            }
        })
        .await?;

        let records = notices.iter().filter_map(to_record).collect();
        Ok(tagger.tag_all(records, true, |record| {
            keyword_or_healthcare(tagger, &self.classifier, record)
        }))
    }
}

fn parse_page(body: &Value) -> CrawlResult<Page<Value>> {
    let results = body
        .get("results")
        .or_else(|| body.get("notices"))
        .and_then(Value::as_array)
        .ok_or_else(|| CrawlError::malformed(TED_ID, "missing results array"))?;
    Ok(Page::new(
        results.clone(),
        as_count(body.get("total").or_else(|| body.get("totalNoticeCount"))),
    ))
}

/// Multilingual fields arrive either as a string or as a map keyed by
/// language code; English wins when present.
fn localized(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => map
            .get("EN")
            .or_else(|| map.get("en"))
            .or_else(|| map.values().next())
            .and_then(|v| localized(Some(v))),
        Value::Array(items) => items.iter().find_map(|v| localized(Some(v))),
        _ => None,
    }
}

fn cpv_codes(notice: &Value) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for key in ["CPV", "ADDITIONAL_CPV"] {
        match notice.get(key) {
            Some(Value::Array(entries)) => codes.extend(
                entries
                    .iter()
                    .filter_map(|e| first_str(e, &["code"]).or_else(|| e.as_str().map(String::from))),
            ),
            Some(entry @ Value::Object(_)) => codes.extend(first_str(entry, &["code"])),
            Some(Value::String(code)) => codes.push(code.clone()),
            _ => {}
        }
    }
    codes.dedup();
    codes
}

fn to_record(notice: &Value) -> Option<TenderRecord> {
    let id = first_str(notice, &["ND", "publication-number"]);
    let url = id
        .as_ref()
        .map(|id| format!("https://ted.europa.eu/udl?uri=TED:NOTICE:{id}:TEXT:EN:HTML"))
        .unwrap_or_default();

    let country = first_str(notice, &["CY"]).unwrap_or_else(|| "EU".to_string());
    let currency = first_str(notice, &["/VAL/currency"]).unwrap_or_else(|| "EUR".to_string());

    let mut record = TenderRecord::new(TED_ID, localized(notice.get("TI")).unwrap_or_default())
        .with_url(url)
        .with_organization(
            localized(notice.pointer("/AA/ON"))
                .or_else(|| localized(notice.get("buyer-name")))
                .unwrap_or_default(),
        )
        .with_locale(&country, &currency)
        .with_payload(notice.clone());
    if let Some(id) = id {
        record = record.with_source_id(id);
    }
    if let Some(description) = localized(notice.get("DS")) {
        record = record.with_description(description);
    }
    record.announcement_date = first_str(notice, &["PD"]).and_then(|d| parse_date(&d));
    record.deadline_date = first_str(notice, &["TD", "DT"]).and_then(|d| parse_date(&d));
    record.estimated_value = match notice.get("VAL") {
        Some(value @ Value::Object(_)) => parse_amount(value.get("amount")),
        other => parse_amount(other),
    };
    record.cpv_codes = cpv_codes(notice);

    record.has_identity().then_some(record)
}

#[async_trait]
impl SourceAdapter for TedAdapter {
    async fn authenticate(&self) -> bool {
        true
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        let session = self.context.open_session(&self.limiter)?;
        let tagger = self.context.tagger(keywords);

        FallbackChain::new(TED_ID)
            .strategy("search_api", self.search_api(&session, &tagger))
            .run()
            .await
    }

    fn supports_native_query(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        TED_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_record_from_notice() {
        let notice = json!({
            "ND": "123456-2024",
            "TI": {"DE": "Labordiagnostik", "EN": "Laboratory diagnostics"},
            "AA": {"ON": "Charité Berlin"},
            "CY": "DE",
            "PD": "20240301",
            "TD": "2024-04-01",
            "CPV": [{"code": "33696500"}],
            "ADDITIONAL_CPV": ["33124110"],
            "VAL": {"amount": 1200000, "currency": "EUR"}
        });

        let record = to_record(&notice).unwrap();
        assert_eq!(record.title, "Laboratory diagnostics");
        assert_eq!(record.organization, "Charité Berlin");
        assert_eq!(record.country, "DE");
        assert_eq!(record.cpv_codes, vec!["33696500", "33124110"]);
        assert_eq!(record.estimated_value, Some(1_200_000.0));
        assert!(record.source_url.contains("TED:NOTICE:123456-2024"));
    }

    #[test]
    fn missing_results_is_malformed() {
        assert!(parse_page(&json!({"error": "bad query"})).is_err());
    }
}
