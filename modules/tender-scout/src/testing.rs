// Test doubles for the crawl coordinator and scheduler.
//
// - MockAdapter (SourceAdapter): scripted records, failures or panics
// - FailingSink (ResultSink): rejects every batch
//
// Plus helpers for constructing records and registry entries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tender_adapters::{AdapterDescriptor, RegisteredAdapter, SourceAdapter};
use tender_common::{CrawlError, CrawlResult, StorageError, TenderRecord};

use crate::sink::ResultSink;

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behaviour {
    Records(Vec<TenderRecord>),
    Fail(String),
    Panic(String),
}

/// Scripted adapter. Clones share the call history, so a test can keep one
/// handle and register another.
/// Builder pattern: `.returning()`, `.failing()`, `.panicking()`,
/// `.unauthenticated()`, `.native_query()`, `.with_delay()`.
#[derive(Clone)]
pub struct MockAdapter {
    id: String,
    authenticated: bool,
    native_query: bool,
    behaviour: Behaviour,
    delay: Duration,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            authenticated: true,
            native_query: false,
            behaviour: Behaviour::Records(Vec::new()),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn returning(mut self, records: Vec<TenderRecord>) -> Self {
        self.behaviour = Behaviour::Records(records);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behaviour = Behaviour::Fail(message.to_string());
        self
    }

    pub fn panicking(mut self, message: &str) -> Self {
        self.behaviour = Behaviour::Panic(message.to_string());
        self
    }

    /// Credentials missing: `authenticate` is false and `fetch` degrades to
    /// no records.
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn native_query(mut self) -> Self {
        self.native_query = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn last_keywords(&self) -> Option<Vec<String>> {
        self.calls.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn authenticate(&self) -> bool {
        self.authenticated
    }

    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(keywords.to_vec());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !self.authenticated {
            return Ok(Vec::new());
        }
        match &self.behaviour {
            Behaviour::Records(records) => Ok(records.clone()),
            Behaviour::Fail(message) => Err(CrawlError::SourceUnreachable {
                adapter: self.id.clone(),
                attempts: vec![message.clone()],
            }),
            Behaviour::Panic(message) => panic!("{message}"),
        }
    }

    fn supports_native_query(&self) -> bool {
        self.native_query
    }

    fn name(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// FailingSink
// ---------------------------------------------------------------------------

/// Sink that rejects every batch.
pub struct FailingSink;

#[async_trait]
impl ResultSink for FailingSink {
    async fn save(&self, _records: &[TenderRecord]) -> Result<(), StorageError> {
        Err(StorageError::Rejected("FailingSink: storage offline".into()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Registry entry for a mock adapter that needs no credentials.
pub fn registered(adapter: MockAdapter, language: &str) -> RegisteredAdapter {
    let descriptor = AdapterDescriptor::new(adapter.id.clone(), language);
    RegisteredAdapter::new(descriptor, Arc::new(adapter))
}

/// Registry entry for a mock adapter that requires credentials.
pub fn credentialed(adapter: MockAdapter, language: &str, configured: bool) -> RegisteredAdapter {
    let descriptor = AdapterDescriptor::new(adapter.id.clone(), language).with_credentials(configured);
    RegisteredAdapter::new(descriptor, Arc::new(adapter))
}

pub fn record(system: &str, source_id: Option<&str>, title: &str) -> TenderRecord {
    let record = TenderRecord::new(system, title);
    match source_id {
        Some(id) => record.with_source_id(id),
        None => record,
    }
}
