use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tender_adapters::{build_adapters, AdapterContext};
use tender_common::{
    load_keyword_file, AdapterRunOutcome, Config, KeywordDefaults, RunSummary, ScheduledJob,
    TriggeredBy,
};
use tender_relevance::RelevanceEngine;
use tracing::info;

use crate::coordinator::{AdapterStatus, RunCoordinator};
use crate::scheduler::{ScheduleError, TenderScheduler};
use crate::sink::{JsonlSink, ResultSink};

/// Snapshot returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub adapters: Vec<AdapterStatus>,
    pub scheduled_jobs: Vec<ScheduledJob>,
    pub checked_at: DateTime<Utc>,
}

/// Status and control surface over the coordinator and scheduler.
#[derive(Clone)]
pub struct CrawlService {
    coordinator: Arc<RunCoordinator>,
    scheduler: Arc<TenderScheduler>,
}

impl CrawlService {
    pub fn new(coordinator: Arc<RunCoordinator>, scheduler: Arc<TenderScheduler>) -> Self {
        Self {
            coordinator,
            scheduler,
        }
    }

    /// Wire the full stack from configuration: keyword file, relevance
    /// engine, adapter registry, JSONL sink, coordinator and scheduler.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let (engine, keyword_defaults) = match &config.keywords_file {
            Some(path) => {
                let file = load_keyword_file(path)?;
                info!(
                    path = %path.display(),
                    dictionary_entries = file.dictionary.len(),
                    "Keyword file loaded"
                );
                (
                    RelevanceEngine::from_keyword_file(&file),
                    KeywordDefaults::from_file(&file),
                )
            }
            None => (RelevanceEngine::builtin(), KeywordDefaults::builtin()),
        };

        let context = AdapterContext::from_config(config, Arc::new(engine));
        let adapters = build_adapters(config, &context)?;
        info!(adapters = adapters.len(), "Adapter registry built");

        let sink: Arc<dyn ResultSink> = Arc::new(JsonlSink::new(&config.data_dir));
        let coordinator = Arc::new(RunCoordinator::from_config(
            config,
            adapters,
            sink,
            keyword_defaults,
        ));
        let scheduler = TenderScheduler::from_config(config, coordinator.clone())
            .await
            .context("Failed to create scheduler")?;

        Ok(Self::new(coordinator, Arc::new(scheduler)))
    }

    pub fn coordinator(&self) -> &Arc<RunCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &Arc<TenderScheduler> {
        &self.scheduler
    }

    pub async fn get_status(&self) -> ServiceStatus {
        ServiceStatus {
            adapters: self.coordinator.status().await,
            scheduled_jobs: self.scheduler.list_jobs().await,
            checked_at: Utc::now(),
        }
    }

    pub async fn get_last_results(&self) -> BTreeMap<String, AdapterRunOutcome> {
        self.coordinator.last_results().await
    }

    pub async fn list_scheduled_jobs(&self) -> Vec<ScheduledJob> {
        self.scheduler.list_jobs().await
    }

    pub async fn run_one(&self, adapter_id: &str, keywords: Option<Vec<String>>) -> AdapterRunOutcome {
        self.coordinator
            .run_one(adapter_id, keywords, TriggeredBy::Manual)
            .await
    }

    pub async fn run_all(&self, keywords: Option<Vec<String>>) -> RunSummary {
        self.coordinator.run_all(keywords, TriggeredBy::Manual).await
    }

    pub async fn add_schedule(
        &self,
        adapter_id: &str,
        trigger_spec: &str,
        job_id: Option<String>,
    ) -> Result<ScheduledJob, ScheduleError> {
        self.scheduler.add_job(adapter_id, trigger_spec, job_id).await
    }

    pub async fn remove_schedule(&self, job_id: &str) -> bool {
        self.scheduler.remove_job(job_id).await
    }

    /// Register default schedules and start firing them.
    pub async fn start(&self) -> Result<(), ScheduleError> {
        self.scheduler.bootstrap_defaults().await?;
        self.scheduler.start().await
    }

    pub async fn shutdown(&self) -> Result<(), ScheduleError> {
        self.scheduler.shutdown().await
    }
}
