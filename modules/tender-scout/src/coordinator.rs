use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tender_adapters::{AdapterDescriptor, RegisteredAdapter};
use tender_common::{
    AdapterRunOutcome, Config, FilterMode, KeywordDefaults, RunSummary, TriggeredBy,
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dedup::dedup;
use crate::run_log::{EventKind, RunLog};
use crate::sink::ResultSink;

/// Where an adapter is in its current (or most recent) run.
///
/// `Succeeded` and `Failed` are idle states: they persist until the next run
/// starts so `status()` shows how the last run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Authenticating,
    Fetching,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_running(self) -> bool {
        matches!(self, RunPhase::Authenticating | RunPhase::Fetching)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Authenticating => write!(f, "authenticating"),
            RunPhase::Fetching => write!(f, "fetching"),
            RunPhase::Succeeded => write!(f, "succeeded"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Per-adapter status row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterStatus {
    pub adapter_id: String,
    pub language: String,
    pub requires_credentials: bool,
    pub credentials_configured: bool,
    pub schedulable: bool,
    pub phase: RunPhase,
    pub last_outcome: Option<AdapterRunOutcome>,
}

type PhaseTable = Arc<RwLock<HashMap<String, RunPhase>>>;

/// Runs adapters, deduplicates their records, hands them to the sink and
/// keeps the last outcome per adapter.
pub struct RunCoordinator {
    adapters: Vec<RegisteredAdapter>,
    keyword_defaults: KeywordDefaults,
    sink: Arc<dyn ResultSink>,
    inter_adapter_delay: Duration,
    run_log_dir: Option<PathBuf>,
    phases: PhaseTable,
    last_results: RwLock<BTreeMap<String, AdapterRunOutcome>>,
}

impl RunCoordinator {
    pub fn new(adapters: Vec<RegisteredAdapter>, sink: Arc<dyn ResultSink>) -> Self {
        let phases = adapters
            .iter()
            .map(|a| (a.id().to_string(), RunPhase::Idle))
            .collect();
        Self {
            adapters,
            keyword_defaults: KeywordDefaults::builtin(),
            sink,
            inter_adapter_delay: Duration::from_secs(5),
            run_log_dir: None,
            phases: Arc::new(RwLock::new(phases)),
            last_results: RwLock::new(BTreeMap::new()),
        }
    }

    /// Coordinator with delay and run-log location taken from `config`.
    pub fn from_config(
        config: &Config,
        adapters: Vec<RegisteredAdapter>,
        sink: Arc<dyn ResultSink>,
        keyword_defaults: KeywordDefaults,
    ) -> Self {
        Self::new(adapters, sink)
            .with_keyword_defaults(keyword_defaults)
            .with_inter_adapter_delay(Duration::from_secs(config.inter_adapter_delay_secs))
            .with_run_log_dir(config.data_dir.clone())
    }

    pub fn with_keyword_defaults(mut self, defaults: KeywordDefaults) -> Self {
        self.keyword_defaults = defaults;
        self
    }

    pub fn with_inter_adapter_delay(mut self, delay: Duration) -> Self {
        self.inter_adapter_delay = delay;
        self
    }

    pub fn with_run_log_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.run_log_dir = Some(data_dir.into());
        self
    }

    pub fn adapter_ids(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.id().to_string()).collect()
    }

    pub fn descriptors(&self) -> Vec<AdapterDescriptor> {
        self.adapters.iter().map(|a| a.descriptor.clone()).collect()
    }

    pub fn has_adapter(&self, adapter_id: &str) -> bool {
        self.find(adapter_id).is_some()
    }

    fn find(&self, adapter_id: &str) -> Option<&RegisteredAdapter> {
        self.adapters.iter().find(|a| a.id() == adapter_id)
    }

    /// Default keywords for an adapter, by its language.
    pub fn default_keywords(&self, adapter_id: &str) -> Vec<String> {
        self.find(adapter_id)
            .map(|a| self.keyword_defaults.for_language(&a.descriptor.language))
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Run one adapter. Always returns exactly one outcome; an unknown id
    /// yields a failed outcome and leaves the last-run table untouched.
    pub async fn run_one(
        &self,
        adapter_id: &str,
        keywords: Option<Vec<String>>,
        triggered_by: TriggeredBy,
    ) -> AdapterRunOutcome {
        let Some(registered) = self.find(adapter_id) else {
            warn!(adapter = adapter_id, "Run requested for unknown adapter");
            return AdapterRunOutcome::failed(
                adapter_id,
                triggered_by,
                format!("unknown adapter: {adapter_id}"),
            );
        };

        let started_at = Utc::now();
        let mut log = RunLog::new(Uuid::new_v4().to_string(), triggered_by);
        let outcome = self
            .execute(registered, keywords, triggered_by, &mut log)
            .await;

        let summary = RunSummary::from_outcomes(vec![outcome.clone()], started_at);
        self.save_log(&log, &summary);
        outcome
    }

    /// Run every registered adapter sequentially, pausing between adapters.
    /// A failing adapter never stops the others.
    pub async fn run_all(
        &self,
        keywords: Option<Vec<String>>,
        triggered_by: TriggeredBy,
    ) -> RunSummary {
        let started_at = Utc::now();
        let mut log = RunLog::new(Uuid::new_v4().to_string(), triggered_by);
        info!(run_id = log.run_id.as_str(), adapters = self.adapters.len(), "Crawl run starting");

        let mut outcomes = Vec::with_capacity(self.adapters.len());
        for (i, registered) in self.adapters.iter().enumerate() {
            if i > 0 && !self.inter_adapter_delay.is_zero() {
                tokio::time::sleep(self.inter_adapter_delay).await;
            }
            let outcome = self
                .execute(registered, keywords.clone(), triggered_by, &mut log)
                .await;
            outcomes.push(outcome);
        }

        let summary = RunSummary::from_outcomes(outcomes, started_at);
        info!("{summary}");
        self.save_log(&log, &summary);
        summary
    }

    async fn execute(
        &self,
        registered: &RegisteredAdapter,
        keywords: Option<Vec<String>>,
        triggered_by: TriggeredBy,
        log: &mut RunLog,
    ) -> AdapterRunOutcome {
        let adapter_id = registered.id().to_string();
        let keywords = match keywords {
            Some(keywords) if !keywords.is_empty() => keywords,
            _ => self.keyword_defaults.for_language(&registered.descriptor.language),
        };
        let filter_mode = FilterMode::for_native_query(registered.adapter.supports_native_query());

        info!(adapter = adapter_id.as_str(), keywords = keywords.len(), %triggered_by, "Adapter run starting");
        log.log(EventKind::AdapterStarted {
            adapter_id: adapter_id.clone(),
            keywords: keywords.clone(),
        });
        self.set_phase(&adapter_id, RunPhase::Authenticating).await;

        let started = Instant::now();
        let adapter = registered.adapter.clone();
        let phases = self.phases.clone();
        let task_id = adapter_id.clone();
        let joined = tokio::spawn(async move {
            let authenticated = adapter.authenticate().await;
            phases.write().await.insert(task_id, RunPhase::Fetching);
            let fetched = adapter.fetch(&keywords).await;
            (authenticated, fetched)
        })
        .await;

        let mut outcome = match joined {
            Ok((authenticated, Ok(records))) => {
                log.log(EventKind::Authentication {
                    adapter_id: adapter_id.clone(),
                    authenticated,
                });
                let fetched = records.len();
                let records = dedup(records);
                log.log(EventKind::Deduplicated {
                    adapter_id: adapter_id.clone(),
                    fetched,
                    kept: records.len(),
                });

                let mut outcome = AdapterRunOutcome {
                    adapter_id: adapter_id.clone(),
                    success: true,
                    records_found: records.len(),
                    execution_time_ms: elapsed_ms(started),
                    error: None,
                    triggered_by,
                    timestamp: Utc::now(),
                    authenticated,
                    filter_mode,
                    persisted: false,
                };

                match self.sink.save(&records).await {
                    Ok(()) => outcome.persisted = true,
                    Err(e) => {
                        warn!(adapter = adapter_id.as_str(), error = %e, "Result sink failed, records not persisted");
                        log.log(EventKind::SinkFailed {
                            adapter_id: adapter_id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
                outcome
            }
            Ok((authenticated, Err(e))) => {
                log.log(EventKind::Authentication {
                    adapter_id: adapter_id.clone(),
                    authenticated,
                });
                log.log(EventKind::FetchFailed {
                    adapter_id: adapter_id.clone(),
                    error: e.to_string(),
                });
                let mut outcome = AdapterRunOutcome::failed(&adapter_id, triggered_by, e.to_string());
                outcome.authenticated = authenticated;
                outcome
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("adapter panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "adapter task cancelled".to_string()
                };
                log.log(EventKind::FetchFailed {
                    adapter_id: adapter_id.clone(),
                    error: message.clone(),
                });
                AdapterRunOutcome::failed(&adapter_id, triggered_by, message)
            }
        };
        outcome.filter_mode = filter_mode;
        if !outcome.success {
            outcome.execution_time_ms = elapsed_ms(started);
        }

        let phase = if outcome.success {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        };
        self.set_phase(&adapter_id, phase).await;
        self.last_results
            .write()
            .await
            .insert(adapter_id.clone(), outcome.clone());

        log.log(EventKind::AdapterFinished {
            adapter_id: adapter_id.clone(),
            success: outcome.success,
            records_found: outcome.records_found,
            execution_time_ms: outcome.execution_time_ms,
        });
        if outcome.success {
            info!(
                adapter = adapter_id.as_str(),
                records = outcome.records_found,
                elapsed_ms = outcome.execution_time_ms,
                authenticated = outcome.authenticated,
                filter_mode = %outcome.filter_mode,
                "Adapter run finished"
            );
        } else {
            warn!(
                adapter = adapter_id.as_str(),
                error = outcome.error.as_deref().unwrap_or_default(),
                elapsed_ms = outcome.execution_time_ms,
                "Adapter run failed"
            );
        }
        outcome
    }

    async fn set_phase(&self, adapter_id: &str, phase: RunPhase) {
        self.phases
            .write()
            .await
            .insert(adapter_id.to_string(), phase);
    }

    fn save_log(&self, log: &RunLog, summary: &RunSummary) {
        let Some(dir) = &self.run_log_dir else {
            return;
        };
        if let Err(e) = log.save(dir, summary) {
            warn!(run_id = log.run_id.as_str(), error = %e, "Failed to save crawl run log");
        }
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> Vec<AdapterStatus> {
        let phases = self.phases.read().await;
        let last = self.last_results.read().await;
        self.adapters
            .iter()
            .map(|a| AdapterStatus {
                adapter_id: a.id().to_string(),
                language: a.descriptor.language.clone(),
                requires_credentials: a.descriptor.requires_credentials,
                credentials_configured: a.descriptor.credentials_configured,
                schedulable: a.descriptor.schedulable(),
                phase: phases.get(a.id()).copied().unwrap_or_default(),
                last_outcome: last.get(a.id()).cloned(),
            })
            .collect()
    }

    pub async fn phase(&self, adapter_id: &str) -> Option<RunPhase> {
        self.phases.read().await.get(adapter_id).copied()
    }

    /// Snapshot of the last-run table.
    pub async fn last_results(&self) -> BTreeMap<String, AdapterRunOutcome> {
        self.last_results.read().await.clone()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::testing::{record, registered, MockAdapter};

    fn coordinator(adapters: Vec<RegisteredAdapter>) -> (RunCoordinator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let coordinator = RunCoordinator::new(adapters, sink.clone())
            .with_inter_adapter_delay(Duration::ZERO);
        (coordinator, sink)
    }

    #[tokio::test]
    async fn run_one_dedups_before_counting() {
        let adapter = MockAdapter::new("G2B").returning(vec![
            record("G2B", Some("123"), "A"),
            record("G2B", Some("123"), "B"),
            record("G2B", Some("124"), "C"),
        ]);
        let (coordinator, sink) = coordinator(vec![registered(adapter, "ko")]);

        let outcome = coordinator.run_one("G2B", None, TriggeredBy::Manual).await;
        assert!(outcome.success);
        assert_eq!(outcome.records_found, 2);
        assert!(outcome.persisted);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[0].title, "A");
    }

    #[tokio::test]
    async fn default_keywords_follow_adapter_language() {
        let adapter = MockAdapter::new("BOAMP");
        let (coordinator, _) = coordinator(vec![registered(adapter.clone(), "fr")]);

        coordinator.run_one("BOAMP", None, TriggeredBy::Manual).await;
        assert_eq!(
            adapter.last_keywords(),
            Some(KeywordDefaults::builtin().for_language("fr"))
        );

        coordinator
            .run_one("BOAMP", Some(vec!["réactifs".into()]), TriggeredBy::Manual)
            .await;
        assert_eq!(adapter.last_keywords(), Some(vec!["réactifs".to_string()]));
    }

    #[tokio::test]
    async fn unknown_adapter_is_failed_and_untracked() {
        let (coordinator, _) = coordinator(vec![registered(MockAdapter::new("TED"), "en")]);

        let outcome = coordinator.run_one("NOPE", None, TriggeredBy::Manual).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("NOPE"));
        assert!(coordinator.last_results().await.is_empty());
    }

    #[tokio::test]
    async fn phases_end_in_terminal_state() {
        let (coordinator, _) = coordinator(vec![
            registered(MockAdapter::new("TED"), "en"),
            registered(MockAdapter::new("UK_FTS").failing("connection refused"), "en"),
        ]);
        assert_eq!(coordinator.phase("TED").await, Some(RunPhase::Idle));

        coordinator.run_all(None, TriggeredBy::Manual).await;
        assert_eq!(coordinator.phase("TED").await, Some(RunPhase::Succeeded));
        assert_eq!(coordinator.phase("UK_FTS").await, Some(RunPhase::Failed));
        assert!(!RunPhase::Succeeded.is_running());
    }

    #[tokio::test]
    async fn writes_run_log_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _) = coordinator(vec![registered(MockAdapter::new("TED"), "en")]);
        let coordinator = coordinator.with_run_log_dir(dir.path());

        coordinator.run_one("TED", None, TriggeredBy::Scheduled).await;

        let logs: Vec<_> = std::fs::read_dir(dir.path().join("crawl-runs"))
            .unwrap()
            .collect();
        assert_eq!(logs.len(), 1);
    }
}
