use std::collections::HashSet;

use tender_common::TenderRecord;

/// Identity used to decide whether two records describe the same tender.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    SourceId { system: String, id: String },
    Url(String),
    Title(String),
}

impl DedupKey {
    /// Key with priority (source_system, source_id), then source_url, then
    /// normalized title. `None` when the record carries none of them.
    pub fn of(record: &TenderRecord) -> Option<Self> {
        if let Some(id) = record.source_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Some(DedupKey::SourceId {
                system: record.source_system.clone(),
                id: id.trim().to_string(),
            });
        }
        let url = record.source_url.trim();
        if !url.is_empty() {
            return Some(DedupKey::Url(url.to_string()));
        }
        let title = record.title.trim().to_lowercase();
        if !title.is_empty() {
            return Some(DedupKey::Title(title));
        }
        None
    }
}

/// Single-pass, order-preserving duplicate filter. The first record for a
/// key wins; later ones are dropped, never merged. Records without any key
/// are always kept.
pub fn dedup(records: Vec<TenderRecord>) -> Vec<TenderRecord> {
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| match DedupKey::of(record) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}
