use std::sync::Arc;

use chrono::{DateTime, Utc};
use tender_common::{TenderRecord, TenderStatus, UrgencyLevel};
use tender_relevance::{ExpandedKeyword, ExpansionOptions, KeywordMatcher, RelevanceEngine};

/// Scores and tags records against one fetch's keywords.
///
/// Built once per `fetch` call: the keyword expansion and its compiled
/// matcher are computed up front and reused for every record.
pub struct RecordTagger {
    expanded: Vec<ExpandedKeyword>,
    matcher: KeywordMatcher,
    urgent_deadline_days: i64,
    now: DateTime<Utc>,
}

impl RecordTagger {
    pub fn new(engine: Arc<RelevanceEngine>, keywords: &[String], urgent_deadline_days: i64) -> Self {
        let expanded = engine.expand(keywords, &ExpansionOptions::default());
        let matcher = KeywordMatcher::new(&expanded);
        Self {
            expanded,
            matcher,
            urgent_deadline_days,
            now: Utc::now(),
        }
    }

    pub fn expanded(&self) -> &[ExpandedKeyword] {
        &self.expanded
    }

    /// Fill relevance score, matched keywords and urgency. Active records whose
    /// deadline already passed are marked closed.
    pub fn tag(&self, mut record: TenderRecord) -> TenderRecord {
        let body = record.body_text();
        record.set_relevance_score(self.matcher.score_fields(&record.title, &body));
        record.matched_keywords = self.matcher.matched_terms(&record.title, &body);
        record.urgency_level =
            UrgencyLevel::from_deadline(record.deadline_date, self.now, self.urgent_deadline_days);
        if record.status == TenderStatus::Active
            && record.deadline_date.is_some_and(|deadline| deadline < self.now)
        {
            record.status = TenderStatus::Closed;
        }
        record
    }

    /// Whether a tagged record matched at least one expanded keyword.
    pub fn matches(&self, record: &TenderRecord) -> bool {
        !record.matched_keywords.is_empty()
    }

    /// Tag every record and drop those without identity. With `client_filter`
    /// only records accepted by `keep` survive.
    pub fn tag_all<F>(&self, records: Vec<TenderRecord>, client_filter: bool, keep: F) -> Vec<TenderRecord>
    where
        F: Fn(&TenderRecord) -> bool,
    {
        records
            .into_iter()
            .filter(TenderRecord::has_identity)
            .map(|record| self.tag(record))
            .filter(|record| !client_filter || keep(record))
            .collect()
    }

    /// Tag and keep only keyword matches.
    pub fn tag_matching(&self, records: Vec<TenderRecord>) -> Vec<TenderRecord> {
        self.tag_all(records, true, |record| self.matches(record))
    }
}
