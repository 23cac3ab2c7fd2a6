use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tender_common::{CrawlError, CrawlResult, TenderRecord};

/// Ordered retrieval strategies for one adapter (primary API, secondary API,
/// feed, scrape).
///
/// Strategies are plain futures and stay unpolled until their turn, so later
/// strategies cost nothing when an earlier one succeeds.
pub struct FallbackChain<'a> {
    adapter: &'a str,
    strategies: Vec<(&'static str, BoxFuture<'a, CrawlResult<Vec<TenderRecord>>>)>,
}

impl<'a> FallbackChain<'a> {
    pub fn new(adapter: &'a str) -> Self {
        Self {
            adapter,
            strategies: Vec::new(),
        }
    }

    pub fn strategy<F>(mut self, name: &'static str, attempt: F) -> Self
    where
        F: Future<Output = CrawlResult<Vec<TenderRecord>>> + Send + 'a,
    {
        self.strategies.push((name, attempt.boxed()));
        self
    }

    /// Run strategies in order until one yields at least one record.
    ///
    /// After exhausting every strategy the result is empty and `Ok` when any
    /// strategy reached the source, or when every failure was a credential
    /// problem. It is `SourceUnreachable` when nothing reached the source and
    /// at least one strategy failed at the transport level.
    pub async fn run(self) -> CrawlResult<Vec<TenderRecord>> {
        let adapter = self.adapter;
        let mut attempted = Vec::with_capacity(self.strategies.len());
        let mut reached = false;
        let mut transport_failures = 0;

        for (name, attempt) in self.strategies {
            attempted.push(name.to_string());
            match attempt.await {
                Ok(records) if !records.is_empty() => {
                    tracing::info!(adapter, strategy = name, records = records.len(), "Strategy succeeded");
                    return Ok(records);
                }
                Ok(_) => {
                    tracing::info!(adapter, strategy = name, "Strategy returned no records");
                    reached = true;
                }
                Err(e) if e.is_auth() => {
                    tracing::warn!(adapter, strategy = name, error = %e, "Strategy skipped, credentials unavailable");
                }
                Err(e) if e.is_transport() => {
                    tracing::warn!(adapter, strategy = name, error = %e, "Strategy could not reach source");
                    transport_failures += 1;
                }
                Err(e) => {
                    tracing::warn!(adapter, strategy = name, error = %e, "Strategy failed");
                    reached = true;
                }
            }
        }

        if !reached && transport_failures > 0 {
            return Err(CrawlError::SourceUnreachable {
                adapter: adapter.to_string(),
                attempts: attempted,
            });
        }
        Ok(Vec::new())
    }
}

/// Merge the independent sub-fetches of one strategy (categories, keywords,
/// feeds). A failed sub-fetch contributes nothing; the first error is
/// returned only when every sub-fetch failed.
pub fn merge_sub_fetches<T>(
    adapter: &str,
    results: impl IntoIterator<Item = (String, CrawlResult<Vec<T>>)>,
) -> CrawlResult<Vec<T>> {
    let mut merged = Vec::new();
    let mut first_error = None;
    let mut any_ok = false;

    for (label, result) in results {
        match result {
            Ok(items) => {
                tracing::debug!(adapter, sub_fetch = %label, items = items.len(), "Sub-fetch complete");
                any_ok = true;
                merged.extend(items);
            }
            Err(e) => {
                tracing::warn!(adapter, sub_fetch = %label, error = %e, "Sub-fetch failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if !any_ok => Err(e),
        _ => Ok(merged),
    }
}
