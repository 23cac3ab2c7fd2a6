//! Integration test: coordinator runs over mock adapters.
//!
//! Covers failure isolation between adapters, degraded credentials,
//! sink failures and the last-run table.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tender_common::{FilterMode, TriggeredBy};
use tender_scout::testing::{credentialed, record, registered, FailingSink, MockAdapter};
use tender_scout::{MemorySink, RunCoordinator, RunPhase};

fn coordinator_with(
    adapters: Vec<tender_adapters::RegisteredAdapter>,
) -> (RunCoordinator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let coordinator =
        RunCoordinator::new(adapters, sink.clone()).with_inter_adapter_delay(Duration::ZERO);
    (coordinator, sink)
}

#[tokio::test]
async fn failing_adapter_does_not_stop_the_others() {
    let (coordinator, sink) = coordinator_with(vec![
        registered(
            MockAdapter::new("A").returning(vec![record("A", Some("1"), "PCR kits")]),
            "en",
        ),
        registered(MockAdapter::new("B").failing("connection refused"), "en"),
        registered(
            MockAdapter::new("C").returning(vec![
                record("C", Some("1"), "Reagents"),
                record("C", Some("2"), "Analysers"),
            ]),
            "en",
        ),
    ]);

    let summary = coordinator.run_all(None, TriggeredBy::Manual).await;

    assert!(summary.success);
    assert_eq!(summary.total_adapters, 3);
    assert_eq!(summary.successful_adapters, 2);
    assert_eq!(summary.total_found, 3);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].adapter_id, "B");

    let ids: Vec<&str> = summary.outcomes.iter().map(|o| o.adapter_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(sink.len(), 3);
}

#[tokio::test]
async fn panicking_adapter_becomes_failed_outcome() {
    let (coordinator, _) = coordinator_with(vec![
        registered(MockAdapter::new("A").returning(vec![record("A", Some("1"), "PCR")]), "en"),
        registered(MockAdapter::new("B").panicking("parser exploded"), "en"),
        registered(MockAdapter::new("C").returning(vec![record("C", Some("1"), "IVD")]), "en"),
    ]);

    let summary = coordinator.run_all(None, TriggeredBy::Manual).await;

    assert!(summary.success);
    let b = &summary.outcomes[1];
    assert!(!b.success);
    assert!(b.error.as_deref().unwrap().contains("parser exploded"));
    assert!(summary.outcomes[0].success && summary.outcomes[2].success);
    assert_eq!(coordinator.phase("B").await, Some(RunPhase::Failed));
}

#[tokio::test]
async fn all_failures_mean_unsuccessful_run() {
    let (coordinator, _) = coordinator_with(vec![
        registered(MockAdapter::new("A").failing("timeout"), "en"),
        registered(MockAdapter::new("B").failing("timeout"), "en"),
    ]);

    let summary = coordinator.run_all(None, TriggeredBy::Manual).await;
    assert!(!summary.success);
    assert_eq!(summary.total_found, 0);
    assert_eq!(summary.errors.len(), 2);
}

#[tokio::test]
async fn unauthenticated_adapter_reports_degraded_outcome() {
    let (coordinator, sink) = coordinator_with(vec![credentialed(
        MockAdapter::new("G2B")
            .returning(vec![record("G2B", Some("1"), "진단키트")])
            .unauthenticated(),
        "ko",
        false,
    )]);

    let outcome = coordinator.run_one("G2B", None, TriggeredBy::Manual).await;
    assert!(outcome.success);
    assert!(!outcome.authenticated);
    assert_eq!(outcome.records_found, 0);
    assert!(sink.is_empty());

    let status = coordinator.status().await;
    assert_eq!(status.len(), 1);
    assert!(status[0].requires_credentials);
    assert!(!status[0].schedulable);
    assert_eq!(status[0].last_outcome.as_ref(), Some(&outcome));
}

#[tokio::test]
async fn sink_failure_keeps_found_count() {
    let coordinator = RunCoordinator::new(
        vec![registered(
            MockAdapter::new("TED").returning(vec![
                record("TED", Some("1"), "PCR"),
                record("TED", Some("2"), "IVD"),
            ]),
            "en",
        )],
        Arc::new(FailingSink),
    );

    let outcome = coordinator.run_one("TED", None, TriggeredBy::Manual).await;
    assert!(outcome.success);
    assert_eq!(outcome.records_found, 2);
    assert!(!outcome.persisted);
}

#[tokio::test]
async fn outcome_reports_filter_mode() {
    let (coordinator, _) = coordinator_with(vec![
        registered(MockAdapter::new("SAM.gov").native_query(), "en"),
        registered(MockAdapter::new("TED"), "en"),
    ]);

    let summary = coordinator.run_all(None, TriggeredBy::Scheduled).await;
    assert_eq!(summary.outcomes[0].filter_mode, FilterMode::ServerSide);
    assert_eq!(summary.outcomes[1].filter_mode, FilterMode::ClientSide);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.triggered_by == TriggeredBy::Scheduled));
}

#[tokio::test]
async fn last_results_keep_latest_outcome_per_adapter() {
    let adapter = MockAdapter::new("BOAMP").returning(vec![record("BOAMP", Some("1"), "Réactifs")]);
    let (coordinator, _) = coordinator_with(vec![registered(adapter.clone(), "fr")]);

    coordinator.run_one("BOAMP", None, TriggeredBy::Manual).await;
    coordinator
        .run_one("BOAMP", None, TriggeredBy::Scheduled)
        .await;

    let last = coordinator.last_results().await;
    assert_eq!(last.len(), 1);
    assert_eq!(last["BOAMP"].triggered_by, TriggeredBy::Scheduled);
    assert_eq!(adapter.call_count(), 2);
}

#[tokio::test]
async fn phase_is_observable_while_fetching() {
    let (coordinator, _) = coordinator_with(vec![registered(
        MockAdapter::new("TED").with_delay(Duration::from_millis(300)),
        "en",
    )]);
    let coordinator = Arc::new(coordinator);

    let running = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_one("TED", None, TriggeredBy::Manual).await })
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut saw_fetching = false;
    while Instant::now() < deadline {
        if coordinator.phase("TED").await == Some(RunPhase::Fetching) {
            saw_fetching = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let outcome = running.await.unwrap();
    assert!(saw_fetching);
    assert!(outcome.success);
    assert!(outcome.execution_time_ms >= 300);
    assert_eq!(coordinator.phase("TED").await, Some(RunPhase::Succeeded));
}
