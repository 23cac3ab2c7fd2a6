use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tender_common::{StorageError, TenderRecord};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Where a run hands its records. Failures are reported, never retried.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save(&self, records: &[TenderRecord]) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// JsonlSink
// ---------------------------------------------------------------------------

/// Appends records as JSON lines to `{data_dir}/tenders/{YYYY-MM-DD}.jsonl`.
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("tenders"),
        }
    }

    /// File receiving today's records.
    pub fn current_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")))
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn save(&self, records: &[TenderRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.current_path();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        info!(path = %path.display(), records = records.len(), "Records appended");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Keeps every saved record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TenderRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TenderRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn save(&self, records: &[TenderRecord]) -> Result<(), StorageError> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| StorageError::Rejected("memory sink poisoned".into()))?;
        stored.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path());

        sink.save(&[TenderRecord::new("TED", "PCR kits").with_source_id("1")])
            .await
            .unwrap();
        sink.save(&[
            TenderRecord::new("TED", "Reagents").with_source_id("2"),
            TenderRecord::new("TED", "Analysers").with_source_id("3"),
        ])
        .await
        .unwrap();

        let content = std::fs::read_to_string(sink.current_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: TenderRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.title, "PCR kits");
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path());
        sink.save(&[]).await.unwrap();
        assert!(!sink.current_path().exists());
    }

    #[tokio::test]
    async fn memory_sink_collects() {
        let sink = MemorySink::new();
        sink.save(&[TenderRecord::new("G2B", "진단키트")]).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].title, "진단키트");
    }
}
