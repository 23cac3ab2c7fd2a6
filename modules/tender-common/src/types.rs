use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound of the relevance scale.
pub const MAX_RELEVANCE_SCORE: f64 = 10.0;

/// Deadlines within this many days are "medium" urgency.
pub const MEDIUM_DEADLINE_DAYS: i64 = 7;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl UrgencyLevel {
    /// Bucket a deadline relative to `now`. No deadline means low urgency.
    pub fn from_deadline(
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        urgent_deadline_days: i64,
    ) -> Self {
        let Some(deadline) = deadline else {
            return UrgencyLevel::Low;
        };
        let days_left = (deadline - now).num_days();
        if days_left <= urgent_deadline_days {
            UrgencyLevel::High
        } else if days_left <= MEDIUM_DEADLINE_DAYS {
            UrgencyLevel::Medium
        } else {
            UrgencyLevel::Low
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyLevel::Low => write!(f, "low"),
            UrgencyLevel::Medium => write!(f, "medium"),
            UrgencyLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    #[default]
    Active,
    Closed,
    Awarded,
    Cancelled,
}

impl fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenderStatus::Active => write!(f, "active"),
            TenderStatus::Closed => write!(f, "closed"),
            TenderStatus::Awarded => write!(f, "awarded"),
            TenderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    Manual,
    Scheduled,
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggeredBy::Manual => write!(f, "manual"),
            TriggeredBy::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Where keyword filtering happened for a run.
///
/// `ServerSide` means the remote source received the keywords; `ClientSide`
/// means everything the source returned was matched locally against the
/// expanded keyword set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    ServerSide,
    ClientSide,
}

impl FilterMode {
    pub fn for_native_query(supports_native_query: bool) -> Self {
        if supports_native_query {
            FilterMode::ServerSide
        } else {
            FilterMode::ClientSide
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::ServerSide => write!(f, "server_side"),
            FilterMode::ClientSide => write!(f, "client_side"),
        }
    }
}

// --- TenderRecord ---

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_RELEVANCE_SCORE)
    }
}

fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(clamp_score)
}

/// One tender/bid announcement, normalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub source_system: String,
    pub source_id: Option<String>,
    pub title: String,
    pub organization: String,
    pub country: String,
    pub currency: String,
    pub estimated_value: Option<f64>,
    pub announcement_date: Option<DateTime<Utc>>,
    pub deadline_date: Option<DateTime<Utc>>,
    pub source_url: String,
    pub description: Option<String>,
    pub cpv_codes: Vec<String>,
    pub language: Option<String>,
    pub matched_keywords: BTreeSet<String>,
    #[serde(deserialize_with = "deserialize_score")]
    relevance_score: f64,
    pub urgency_level: UrgencyLevel,
    pub status: TenderStatus,
    pub collected_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

impl TenderRecord {
    pub fn new(source_system: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_system: source_system.into(),
            source_id: None,
            title: title.into(),
            organization: String::new(),
            country: String::new(),
            currency: String::new(),
            estimated_value: None,
            announcement_date: None,
            deadline_date: None,
            source_url: String::new(),
            description: None,
            cpv_codes: Vec::new(),
            language: None,
            matched_keywords: BTreeSet::new(),
            relevance_score: 0.0,
            urgency_level: UrgencyLevel::Low,
            status: TenderStatus::Active,
            collected_at: Utc::now(),
            raw_payload: serde_json::Value::Null,
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.source_id = (!id.trim().is_empty()).then_some(id);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_locale(mut self, country: &str, currency: &str) -> Self {
        self.country = country.to_string();
        self.currency = currency.to_string();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.raw_payload = payload;
        self
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    /// Set the relevance score, clamped to `[0, 10]`.
    pub fn set_relevance_score(&mut self, score: f64) {
        self.relevance_score = clamp_score(score);
    }

    /// A record needs at least one of: a source URL, a source id, or a title.
    pub fn has_identity(&self) -> bool {
        !self.source_url.trim().is_empty()
            || self.source_id.as_deref().is_some_and(|id| !id.trim().is_empty())
            || !self.title.trim().is_empty()
    }

    /// Text searched by keyword matching besides the title.
    pub fn body_text(&self) -> String {
        let mut body = self.organization.clone();
        if let Some(description) = &self.description {
            body.push(' ');
            body.push_str(description);
        }
        body
    }
}

// --- Run outcomes ---

/// Result of one adapter run. Overwrites the adapter's previous entry in the
/// coordinator's last-run table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRunOutcome {
    pub adapter_id: String,
    pub success: bool,
    pub records_found: usize,
    pub execution_time_ms: u64,
    pub error: Option<String>,
    pub triggered_by: TriggeredBy,
    pub timestamp: DateTime<Utc>,
    /// False when the adapter ran in degraded mode without credentials.
    pub authenticated: bool,
    pub filter_mode: FilterMode,
    /// Whether the result sink accepted the batch.
    pub persisted: bool,
}

impl AdapterRunOutcome {
    pub fn failed(
        adapter_id: impl Into<String>,
        triggered_by: TriggeredBy,
        error: impl Into<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            success: false,
            records_found: 0,
            execution_time_ms: 0,
            error: Some(error.into()),
            triggered_by,
            timestamp: Utc::now(),
            authenticated: false,
            filter_mode: FilterMode::ClientSide,
            persisted: false,
        }
    }
}

/// Per-adapter error line in a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterError {
    pub adapter_id: String,
    pub message: String,
}

/// Aggregate of one run over all adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub total_adapters: usize,
    pub successful_adapters: usize,
    pub total_found: usize,
    pub outcomes: Vec<AdapterRunOutcome>,
    pub errors: Vec<AdapterError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_outcomes(
        outcomes: Vec<AdapterRunOutcome>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let successful_adapters = outcomes.iter().filter(|o| o.success).count();
        let total_found = outcomes.iter().map(|o| o.records_found).sum();
        let errors = outcomes
            .iter()
            .filter_map(|o| {
                o.error.as_ref().map(|message| AdapterError {
                    adapter_id: o.adapter_id.clone(),
                    message: message.clone(),
                })
            })
            .collect();

        Self {
            success: successful_adapters > 0,
            total_adapters: outcomes.len(),
            successful_adapters,
            total_found,
            outcomes,
            errors,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Crawl Run Complete ===")?;
        writeln!(
            f,
            "Adapters succeeded: {}/{}",
            self.successful_adapters, self.total_adapters
        )?;
        writeln!(f, "Records found:      {}", self.total_found)?;
        for outcome in &self.outcomes {
            let state = if outcome.success { "ok" } else { "failed" };
            writeln!(
                f,
                "  {:<10} {:<6} {:>5} records  {:>7} ms",
                outcome.adapter_id, state, outcome.records_found, outcome.execution_time_ms
            )?;
        }
        for error in &self.errors {
            writeln!(f, "  error [{}]: {}", error.adapter_id, error.message)?;
        }
        Ok(())
    }
}

/// A registered trigger bound to one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    pub adapter_id: String,
    pub trigger_spec: String,
    pub next_run_time: Option<DateTime<Utc>>,
}
