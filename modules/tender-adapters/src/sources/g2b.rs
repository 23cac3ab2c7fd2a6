use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tender_common::{CrawlError, CrawlResult, TenderRecord};

use crate::adapter::{AdapterContext, SourceAdapter};
use crate::chain::{merge_sub_fetches, FallbackChain};
use crate::http::HttpSession;
use crate::normalize::{as_count, first_str, item_list, parse_amount, parse_date};
use crate::pagination::{paginate, Page, PaginationPolicy};
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

pub const G2B_ID: &str = "G2B";

const DEFAULT_BASE_URL: &str = "https://apis.data.go.kr/1230000/ad/BidPublicInfoService";
const DETAIL_URL: &str = "https://www.g2b.go.kr/ep/invitation/publish/bidInfoDtl/bidInfoDtl.do";
const PAGE_SIZE: usize = 100;
const LOOKBACK_DAYS: i64 = 30;

/// Bid categories and the list operation serving each.
const CATEGORIES: [(&str, &str); 4] = [
    ("service", "getBidPblancListInfoServc"),
    ("goods", "getBidPblancListInfoThng"),
    ("construction", "getBidPblancListInfoCnstwk"),
    ("etc", "getBidPblancListInfoEtc"),
];

/// Korean public procurement (나라장터) bid announcement API adapter.
///
/// Lists announcements of the last 30 days across the four bid categories
/// and filters them locally against the expanded keywords; the API has no
/// keyword search.
///
/// API docs: https://www.data.go.kr/data/15129394/openapi.do
/// Auth: service key (G2B_API_KEY)
/// Rate limit: one request per second
pub struct G2bAdapter {
    api_key: Option<String>,
    base_url: String,
    context: AdapterContext,
    limiter: Arc<HostRateLimiter>,
}

impl G2bAdapter {
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

    async fn open_api(
        &self,
        session: &HttpSession,
        tagger: &RecordTagger,
    ) -> CrawlResult<Vec<TenderRecord>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CrawlError::AuthenticationUnavailable {
                adapter: G2B_ID.to_string(),
            })?;

        let now = Utc::now();
        let window = (
            (now - chrono::Duration::days(LOOKBACK_DAYS))
                .format("%Y%m%d%H%M")
                .to_string(),
            now.format("%Y%m%d%H%M").to_string(),
        );

        let mut fetched = Vec::with_capacity(CATEGORIES.len());
        for (category, operation) in CATEGORIES {
            let result = self.fetch_category(session, api_key, operation, &window).await;
            fetched.push((category.to_string(), result));
        }
        let items = merge_sub_fetches(G2B_ID, fetched)?;

        let records: Vec<TenderRecord> = items.iter().filter_map(to_record).collect();
        let matched = tagger.tag_matching(records);
        tracing::info!(
            adapter = G2B_ID,
            items = items.len(),
            matched = matched.len(),
            "G2B fetch complete"
        );
        Ok(matched)
    }

    async fn fetch_category(
        &self,
        session: &HttpSession,
        api_key: &str,
        operation: &str,
        window: &(String, String),
    ) -> CrawlResult<Vec<Value>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), operation);
        let url = url.as_str();

        paginate(G2B_ID, PaginationPolicy::new(PAGE_SIZE), move |page| {
            let request = session
                .get(url)
                .query(&[
                    ("serviceKey", api_key),
                    ("type", "json"),
                    ("inqryDiv", "2"),
                    ("inqryBgnDt", window.0.as_str()),
                    ("inqryEndDt", window.1.as_str()),
                ])
                .query(&[("numOfRows", page.size), ("pageNo", page.number)]);
            async move {
                let body = session.json(request).await?;
                parse_page(&body)
            }
        })
        .await
    }
}

fn parse_page(body: &Value) -> CrawlResult<Page<Value>> {
    if let Some(code) = first_str(body, &["/response/header/resultCode"]) {
        if code != "00" {
            let message = first_str(body, &["/response/header/resultMsg"]).unwrap_or_default();
            return Err(CrawlError::malformed(
                G2B_ID,
                format!("result code {code}: {message}"),
            ));
        }
    }

    let body = body
        .pointer("/response/body")
        .ok_or_else(|| CrawlError::malformed(G2B_ID, "missing response body"))?;
    let items = body.get("items").map(item_list).unwrap_or_default();
    Ok(Page::new(items, as_count(body.get("totalCount"))))
}

fn to_record(item: &Value) -> Option<TenderRecord> {
    let title = first_str(item, &["bidNtceNm", "ntceNm", "bidNm"]).unwrap_or_default();
    let bid_no = first_str(item, &["bidNtceNo"]);
    let round = first_str(item, &["bidNtceOrd"]).unwrap_or_else(|| "000".to_string());
    let url = first_str(item, &["bidNtceDtlUrl"])
        .or_else(|| {
            bid_no
                .as_ref()
                .map(|no| format!("{DETAIL_URL}?bidNo={no}&bidRound={round}"))
        })
        .unwrap_or_default();

    let mut record = TenderRecord::new(G2B_ID, title)
        .with_url(url)
        .with_organization(
            first_str(item, &["ntceInsttNm", "dminsttNm", "insttNm"]).unwrap_or_default(),
        )
        .with_locale("KR", "KRW")
        .with_payload(item.clone());
    if let Some(no) = bid_no {
        record = record.with_source_id(format!("{no}-{round}"));
    }
    record.announcement_date = first_str(item, &["bidNtceDt"]).and_then(|d| parse_date(&d));
    record.deadline_date = first_str(item, &["bidClseDt"]).and_then(|d| parse_date(&d));
    record.estimated_value = ["presmptPrce", "refAmt", "asignBdgtAmt"]
        .iter()
        .find_map(|key| parse_amount(item.get(*key)));
    record.language = Some("ko".to_string());

    record.has_identity().then_some(record)
}

#[async_trait]
impl SourceAdapter for G2bAdapter {
    async fn authenticate(&self) -> bool {
        if self.api_key.is_some() {
            return true;
        }
        tracing::warn!(adapter = G2B_ID, "G2B_API_KEY not set, running without credentials");
        false
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        let session = self.context.open_session(&self.limiter)?;
        let tagger = self.context.tagger(keywords);

        FallbackChain::new(G2B_ID)
            .strategy("open_api", self.open_api(&session, &tagger))
            .run()
            .await
    }

    fn supports_native_query(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        G2B_ID
    }
}
