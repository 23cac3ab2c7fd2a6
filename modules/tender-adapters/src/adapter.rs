use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tender_common::{Config, CrawlResult, TenderRecord};
use tender_relevance::RelevanceEngine;

use crate::http::{HttpSession, HttpSettings};
use crate::rate_limit::HostRateLimiter;
use crate::tagging::RecordTagger;

/// Uniform contract every tender source implements.
///
/// Recoverable problems (HTTP errors, empty or malformed pages) never
/// surface as errors from `fetch`; they reduce to fewer records. `fetch`
/// returns `Err` only when every retrieval path failed without reaching the
/// source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Check credentials. `false` means the adapter runs in degraded mode
    /// and returns no records from credentialed paths. Never errors.
    async fn authenticate(&self) -> bool;

    /// Fetch tagged records matching `keywords`.
    async fn fetch(&self, keywords: &[String]) -> CrawlResult<Vec<TenderRecord>>;

    /// Whether the remote source filters by keyword server-side.
    fn supports_native_query(&self) -> bool;

    /// Adapter id (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Registration metadata the coordinator keeps next to each adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    pub id: String,
    /// Language of the default keyword list (`ko`, `en`, `fr`, ...).
    pub language: String,
    pub requires_credentials: bool,
    pub credentials_configured: bool,
}

impl AdapterDescriptor {
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            requires_credentials: false,
            credentials_configured: false,
        }
    }

    pub fn with_credentials(mut self, configured: bool) -> Self {
        self.requires_credentials = true;
        self.credentials_configured = configured;
        self
    }

    /// Adapters that need credentials are schedulable only once configured.
    pub fn schedulable(&self) -> bool {
        !self.requires_credentials || self.credentials_configured
    }
}

/// An adapter plus its registration metadata.
#[derive(Clone)]
pub struct RegisteredAdapter {
    pub descriptor: AdapterDescriptor,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl RegisteredAdapter {
    pub fn new(descriptor: AdapterDescriptor, adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            descriptor,
            adapter,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Shared dependencies handed to every adapter at construction.
#[derive(Clone)]
pub struct AdapterContext {
    pub engine: Arc<RelevanceEngine>,
    pub http: HttpSettings,
    pub urgent_deadline_days: i64,
}

impl AdapterContext {
    pub fn new(engine: Arc<RelevanceEngine>) -> Self {
        Self {
            engine,
            http: HttpSettings::default(),
            urgent_deadline_days: 3,
        }
    }

    pub fn from_config(config: &Config, engine: Arc<RelevanceEngine>) -> Self {
        Self {
            engine,
            http: HttpSettings::default()
                .with_timeout(Duration::from_secs(config.request_timeout_secs)),
            urgent_deadline_days: config.urgent_deadline_days,
        }
    }

    /// Open the HTTP session for one adapter invocation.
    pub fn open_session(&self, limiter: &Arc<HostRateLimiter>) -> CrawlResult<HttpSession> {
        HttpSession::open(&self.http, limiter.clone())
    }

    pub fn tagger(&self, keywords: &[String]) -> RecordTagger {
        RecordTagger::new(self.engine.clone(), keywords, self.urgent_deadline_days)
    }
}
