//! Crawl run log: persisted JSON timeline of every step taken during a run.
//!
//! Each run produces a single `{DATA_DIR}/crawl-runs/{run_id}.json` file
//! containing an ordered list of events with timestamps.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tender_common::{RunSummary, TriggeredBy};
use tracing::info;

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub triggered_by: TriggeredBy,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    AdapterStarted {
        adapter_id: String,
        keywords: Vec<String>,
    },
    Authentication {
        adapter_id: String,
        authenticated: bool,
    },
    FetchFailed {
        adapter_id: String,
        error: String,
    },
    Deduplicated {
        adapter_id: String,
        fetched: usize,
        kept: usize,
    },
    SinkFailed {
        adapter_id: String,
        error: String,
    },
    AdapterFinished {
        adapter_id: String,
        success: bool,
        records_found: usize,
        execution_time_ms: u64,
    },
}

impl RunLog {
    pub fn new(run_id: String, triggered_by: TriggeredBy) -> Self {
        Self {
            run_id,
            triggered_by,
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    pub fn events(&self) -> impl Iterator<Item = &EventKind> {
        self.events.iter().map(|e| &e.kind)
    }

    /// Serialize the run log to JSON under `data_dir` and write to disk.
    /// Returns the file path on success.
    pub fn save(&self, data_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
        let dir = data_dir.join("crawl-runs");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: &self.run_id,
            triggered_by: self.triggered_by,
            started_at: self.started_at,
            finished_at: Utc::now(),
            summary,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Crawl run log saved");

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Serialization wrapper
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: &'a str,
    triggered_by: TriggeredBy,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    summary: &'a RunSummary,
    events: &'a [RunEvent],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_ordered_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new("run-1".into(), TriggeredBy::Manual);
        log.log(EventKind::AdapterStarted {
            adapter_id: "TED".into(),
            keywords: vec!["PCR".into()],
        });
        log.log(EventKind::Authentication {
            adapter_id: "TED".into(),
            authenticated: true,
        });

        let summary = RunSummary::from_outcomes(Vec::new(), Utc::now());
        let path = log.save(dir.path(), &summary).unwrap();
        assert!(path.ends_with("crawl-runs/run-1.json"));

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["run_id"], "run-1");
        assert_eq!(saved["triggered_by"], "manual");
        assert_eq!(saved["events"][0]["type"], "adapter_started");
        assert_eq!(saved["events"][1]["seq"], 1);
        assert_eq!(saved["events"][1]["authenticated"], true);
    }
}
