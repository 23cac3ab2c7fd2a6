//! Adapter contract tests against mocked source endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tender_adapters::sources::{BoampAdapter, G2bAdapter, SamGovAdapter, TedAdapter, UkFtsAdapter};
use tender_adapters::{AdapterContext, HttpSettings, SourceAdapter};
use tender_common::CrawlError;
use tender_relevance::RelevanceEngine;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context() -> AdapterContext {
    let mut context = AdapterContext::new(Arc::new(RelevanceEngine::builtin()));
    context.http = HttpSettings::default().with_timeout(Duration::from_millis(500));
    context
}

fn keywords(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

fn g2b_page(items: Vec<Value>, total: usize) -> Value {
    json!({"response": {
        "header": {"resultCode": "00", "resultMsg": "NORMAL SERVICE."},
        "body": {"items": items, "totalCount": total, "numOfRows": 100, "pageNo": 1}
    }})
}

#[tokio::test]
async fn g2b_filters_listing_and_survives_failing_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getBidPblancListInfoThng"))
        .and(query_param("serviceKey", "test-key"))
        .and(query_param("pageNo", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(g2b_page(
            vec![
                json!({"bidNtceNo": "R24001", "bidNtceOrd": "00", "bidNtceNm": "PCR 진단시약 구매", "ntceInsttNm": "질병관리청"}),
                json!({"bidNtceNo": "R24002", "bidNtceOrd": "00", "bidNtceNm": "청사 도로 포장 공사", "ntceInsttNm": "행정안전부"}),
            ],
            2,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getBidPblancListInfoServc"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = G2bAdapter::new(Some("test-key".into()), context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    assert!(adapter.authenticate().await);
    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_id.as_deref(), Some("R24001-00"));
    assert!(records[0].matched_keywords.contains("PCR"));
    assert!(records[0].relevance_score() > 0.0);
}

#[tokio::test]
async fn g2b_without_key_degrades_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(g2b_page(vec![], 0)))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = G2bAdapter::new(None, context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    assert!(!adapter.authenticate().await);
    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn samgov_pages_by_offset_until_declared_total() {
    let server = MockServer::start().await;
    let first: Vec<Value> = (0..100)
        .map(|i| json!({"noticeId": format!("n{i}"), "title": format!("PCR reagents lot {i}")}))
        .collect();
    Mock::given(method("GET"))
        .and(header("X-API-Key", "sam-key"))
        .and(query_param("keyword", "PCR"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"totalRecords": 101, "opportunitiesData": first})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("keyword", "PCR"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalRecords": 101,
            "opportunitiesData": [{"noticeId": "n100", "title": "Laboratory furniture"}]
        })))
        .mount(&server)
        .await;

    let adapter = SamGovAdapter::new(Some("sam-key".into()), context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    // Native query: every returned record is kept, matched or not.
    assert_eq!(records.len(), 101);
    assert!(records.iter().any(|r| r.matched_keywords.is_empty()));
}

#[tokio::test]
async fn ted_keeps_healthcare_cpv_notices_without_keyword_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("pageNum", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "results": [
                {"ND": "1-2024", "TI": "Reagents for clinical chemistry", "CPV": [{"code": "33696500"}]},
                {"ND": "2-2024", "TI": "Road maintenance", "CPV": [{"code": "45233141"}]}
            ]
        })))
        .mount(&server)
        .await;

    let adapter = TedAdapter::new(context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_id.as_deref(), Some("1-2024"));
}

#[tokio::test]
async fn uk_falls_back_to_contracts_finder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1.0/ocdsReleasePackages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Published/Notices/OCDS/Search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "releases": [{
                "ocid": "ocds-b5fd17-1",
                "buyer": {"name": "NHS Trust"},
                "tender": {"title": "PCR testing service", "status": "active"}
            }]
        })))
        .mount(&server)
        .await;

    let adapter = UkFtsAdapter::new(context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]
        .source_url
        .starts_with("https://www.contractsfinder.service.gov.uk/notice/"));
}

const BOAMP_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>BOAMP</title>
  <item>
    <title>Fourniture de réactifs PCR</title>
    <link>https://www.boamp.fr/avis/detail/24-1001</link>
    <guid>24-1001</guid>
    <pubDate>Tue, 05 Mar 2024 10:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Travaux de voirie</title>
    <link>https://www.boamp.fr/avis/detail/24-1002</link>
    <guid>24-1002</guid>
  </item>
</channel></rss>"#;

#[tokio::test]
async fn boamp_reads_rss_when_one_feed_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/avis/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(BOAMP_RSS),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rss/boamp.xml"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let adapter = BoampAdapter::new(context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_id.as_deref(), Some("24-1001"));
    assert_eq!(records[0].currency, "EUR");
}

#[tokio::test]
async fn boamp_scrapes_search_page_when_feeds_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/avis"))
        .and(query_param("query", "PCR"))
        .and(query_param("type", "marches"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                 <article><h3><a href="/avis/detail/24-3001">Acquisition de tests PCR</a></h3></article>
               </body></html>"#,
        ))
        .mount(&server)
        .await;

    let adapter = BoampAdapter::new(context())
        .with_base_url(server.uri())
        .with_request_interval(Duration::ZERO);

    let records = adapter.fetch(&keywords(&["PCR"])).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_id.as_deref(), Some("24-3001"));
    assert_eq!(records[0].source_url, format!("{}/avis/detail/24-3001", server.uri()));
}

#[tokio::test]
async fn unreachable_source_is_an_error() {
    // Nothing listens on the discard port.
    let adapter = UkFtsAdapter::new(context())
        .with_base_url("http://127.0.0.1:9")
        .with_request_interval(Duration::ZERO);

    let err = adapter.fetch(&keywords(&["PCR"])).await.unwrap_err();
    match err {
        CrawlError::SourceUnreachable { adapter, attempts } => {
            assert_eq!(adapter, "UK_FTS");
            assert_eq!(attempts, vec!["ocds_api", "contracts_finder"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
