//! Integration test: cron job registration against a live scheduler.
//!
//! Assertions look at the job table and computed next-run times; the
//! firing path itself is covered by the scheduler's unit tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tender_scout::testing::{credentialed, registered, MockAdapter};
use tender_scout::{CrawlService, MemorySink, RunCoordinator, ScheduleError, TenderScheduler};

fn coordinator(adapters: Vec<tender_adapters::RegisteredAdapter>) -> Arc<RunCoordinator> {
    Arc::new(
        RunCoordinator::new(adapters, Arc::new(MemorySink::new()))
            .with_inter_adapter_delay(Duration::ZERO),
    )
}

async fn scheduler_for(ids: &[&str]) -> TenderScheduler {
    let adapters = ids
        .iter()
        .map(|id| registered(MockAdapter::new(id), "en"))
        .collect();
    TenderScheduler::new(coordinator(adapters)).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn daily_job_is_listed_with_next_run_within_a_day() {
    let scheduler = scheduler_for(&["X"]).await;

    let job = scheduler.add_job("X", "0 9 * * *", None).await.unwrap();
    assert!(job.job_id.starts_with("X_custom_"));

    let jobs = scheduler.list_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].adapter_id, "X");
    assert_eq!(jobs[0].trigger_spec, "0 9 * * *");
    let next = jobs[0].next_run_time.unwrap();
    assert!(next > Utc::now());
    assert!(next < Utc::now() + chrono::Duration::hours(24));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_spec_registers_nothing() {
    let scheduler = scheduler_for(&["X"]).await;

    let err = scheduler
        .add_job("X", "not a cron", Some("bad".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidSpec { .. }));
    assert!(scheduler.list_jobs().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_adapter_is_rejected() {
    let scheduler = scheduler_for(&["X"]).await;

    let err = scheduler.add_job("Y", "0 9 * * *", None).await.unwrap_err();
    assert!(matches!(err, ScheduleError::UnknownAdapter(id) if id == "Y"));
    assert!(scheduler.list_jobs().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_job_id_is_rejected() {
    let scheduler = scheduler_for(&["X"]).await;

    scheduler
        .add_job("X", "0 9 * * *", Some("morning".into()))
        .await
        .unwrap();
    let err = scheduler
        .add_job("X", "30 10 * * 1-5", Some("morning".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::DuplicateJob(id) if id == "morning"));

    let jobs = scheduler.list_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].trigger_spec, "0 9 * * *");
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_job_reports_whether_it_existed() {
    let scheduler = scheduler_for(&["X"]).await;
    scheduler
        .add_job("X", "0 9 * * *", Some("morning".into()))
        .await
        .unwrap();

    assert!(scheduler.remove_job("morning").await);
    assert!(!scheduler.remove_job("morning").await);
    assert!(scheduler.list_jobs().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn list_is_sorted_by_next_run() {
    let scheduler = scheduler_for(&["X"]).await;
    let now = Utc::now();
    let later = (now + chrono::Duration::hours(3)).format("%M %H * * *").to_string();
    let sooner = (now + chrono::Duration::hours(1)).format("%M %H * * *").to_string();

    scheduler.add_job("X", &later, Some("later".into())).await.unwrap();
    scheduler.add_job("X", &sooner, Some("sooner".into())).await.unwrap();

    let ids: Vec<String> = scheduler
        .list_jobs()
        .await
        .into_iter()
        .map(|j| j.job_id)
        .collect();
    assert_eq!(ids, vec!["sooner", "later"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_staggers_every_adapter() {
    let coordinator = coordinator(vec![
        registered(MockAdapter::new("A"), "en"),
        registered(MockAdapter::new("B"), "en"),
        credentialed(MockAdapter::new("C").unauthenticated(), "ko", false),
    ]);
    let scheduler = TenderScheduler::new(coordinator).await.unwrap();

    let added = scheduler.bootstrap_defaults().await.unwrap();
    let mut specs: Vec<(String, String)> = added
        .iter()
        .map(|j| (j.adapter_id.clone(), j.trigger_spec.clone()))
        .collect();
    specs.sort();
    assert_eq!(
        specs,
        vec![
            ("A".to_string(), "0 18 * * *".to_string()),
            ("A".to_string(), "0 9 * * *".to_string()),
            ("B".to_string(), "5 18 * * *".to_string()),
            ("B".to_string(), "5 9 * * *".to_string()),
            ("C".to_string(), "10 18 * * *".to_string()),
            ("C".to_string(), "10 9 * * *".to_string()),
        ]
    );
    assert!(added.iter().any(|j| j.job_id == "A_daily_0900"));
    assert!(added.iter().any(|j| j.job_id == "B_daily_1805"));
    assert!(added.iter().any(|j| j.job_id == "C_daily_0910"));

    let again = scheduler.bootstrap_defaults().await.unwrap();
    assert!(again.is_empty());
    assert_eq!(scheduler.list_jobs().await.len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn service_facade_manages_schedules_and_runs() {
    let adapter = MockAdapter::new("TED");
    let coordinator = coordinator(vec![registered(adapter.clone(), "en")]);
    let scheduler = Arc::new(TenderScheduler::new(coordinator.clone()).await.unwrap());
    let service = CrawlService::new(coordinator, scheduler);

    let job = service
        .add_schedule("TED", "0 6 * * 1", Some("weekly".into()))
        .await
        .unwrap();
    assert_eq!(service.list_scheduled_jobs().await, vec![job]);

    let outcome = service
        .run_one("TED", Some(vec!["pcr".into()]))
        .await;
    assert!(outcome.success);
    assert_eq!(adapter.last_keywords(), Some(vec!["pcr".to_string()]));

    let status = service.get_status().await;
    assert_eq!(status.adapters.len(), 1);
    assert_eq!(status.scheduled_jobs.len(), 1);
    assert_eq!(service.get_last_results().await["TED"], outcome);

    assert!(service.remove_schedule("weekly").await);
    assert!(service.list_scheduled_jobs().await.is_empty());
}
