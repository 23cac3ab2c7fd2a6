//! Cron-triggered adapter runs.
//!
//! Trigger specs use the 5-field cron form (`minute hour day month
//! day-of-week`, UTC). They are validated and translated to the 6-field form
//! `tokio-cron-scheduler` expects before anything is registered.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tender_common::{AdapterRunOutcome, Config, ScheduledJob, TriggeredBy};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::RunCoordinator;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid trigger spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("job already exists: {0}")]
    DuplicateJob(String),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

fn invalid(spec: &str, reason: impl Into<String>) -> ScheduleError {
    ScheduleError::InvalidSpec {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn day_name(spec: &str, raw: &str) -> Result<&'static str, ScheduleError> {
    match raw.parse::<usize>() {
        Ok(n) if n < DAY_NAMES.len() => Ok(DAY_NAMES[n]),
        Ok(n) => Err(invalid(spec, format!("day-of-week {n} out of range 0-7"))),
        // Already a name (MON, tue, ...); the cron parser validates it.
        Err(_) => Ok(""),
    }
}

/// Translate one comma-separated part of a numeric day-of-week field.
fn translate_day_part(spec: &str, part: &str) -> Result<String, ScheduleError> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (part, None),
    };
    let with_step = |body: String| match step {
        Some(step) => format!("{body}/{step}"),
        None => body,
    };

    if range == "*" {
        return Ok(with_step(range.to_string()));
    }

    match range.split_once('-') {
        Some((start, end)) => {
            let (start_name, end_name) = (day_name(spec, start)?, day_name(spec, end)?);
            if start_name.is_empty() || end_name.is_empty() {
                return Ok(part.to_string());
            }
            // 7 is Sunday at the end of the week; the cron parser counts
            // Sunday first, so split the range.
            if end == "7" && start != "0" && start != "7" {
                if step.is_some() {
                    return Err(invalid(spec, "stepped day-of-week range ending in 7"));
                }
                return Ok(format!("{start_name}-SAT,SUN"));
            }
            let end_name = if end == "7" { "SAT" } else { end_name };
            Ok(with_step(format!("{start_name}-{end_name}")))
        }
        None => {
            let name = day_name(spec, range)?;
            if name.is_empty() {
                Ok(part.to_string())
            } else {
                Ok(with_step(name.to_string()))
            }
        }
    }
}

/// Translate a 5-field cron spec into the 6-field expression used by the
/// scheduler (seconds pinned to 0, day-of-week numerals as names).
pub fn to_cron_expression(spec: &str) -> Result<String, ScheduleError> {
    let fields: Vec<&str> = spec.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(
            spec,
            format!("expected 5 fields (minute hour day month day-of-week), got {}", fields.len()),
        ));
    }
    if let Some(bad) = fields
        .iter()
        .find(|f| !f.chars().all(|c| c.is_ascii_alphanumeric() || "*,-/".contains(c)))
    {
        return Err(invalid(spec, format!("unexpected characters in '{bad}'")));
    }

    let day_of_week = fields[4]
        .split(',')
        .map(|part| translate_day_part(spec, part))
        .collect::<Result<Vec<_>, _>>()?
        .join(",");

    let expression = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    );
    Schedule::from_str(&expression).map_err(|e| invalid(spec, e.to_string()))?;
    Ok(expression)
}

fn next_run(schedule: &Schedule) -> Option<DateTime<Utc>> {
    schedule.upcoming(Utc).next()
}

// ---------------------------------------------------------------------------
// TenderScheduler
// ---------------------------------------------------------------------------

struct JobEntry {
    uuid: Uuid,
    adapter_id: String,
    trigger_spec: String,
    schedule: Schedule,
}

/// Cron scheduler that fires `RunCoordinator::run_one` for registered jobs.
pub struct TenderScheduler {
    scheduler: JobScheduler,
    coordinator: Arc<RunCoordinator>,
    jobs: Mutex<HashMap<String, JobEntry>>,
    daily_run_hours: Vec<u32>,
    stagger_minutes: u32,
}

impl TenderScheduler {
    pub async fn new(coordinator: Arc<RunCoordinator>) -> Result<Self, ScheduleError> {
        Ok(Self {
            scheduler: JobScheduler::new().await?,
            coordinator,
            jobs: Mutex::new(HashMap::new()),
            daily_run_hours: vec![9, 18],
            stagger_minutes: 5,
        })
    }

    /// Scheduler with default daily hours and stagger taken from `config`.
    pub async fn from_config(
        config: &Config,
        coordinator: Arc<RunCoordinator>,
    ) -> Result<Self, ScheduleError> {
        let mut scheduler = Self::new(coordinator).await?;
        scheduler.daily_run_hours = config.daily_run_hours.clone();
        scheduler.stagger_minutes = config.schedule_stagger_minutes;
        Ok(scheduler)
    }

    /// Register a cron trigger for an adapter. Nothing is registered when the
    /// spec, the adapter id or the job id is rejected.
    pub async fn add_job(
        &self,
        adapter_id: &str,
        trigger_spec: &str,
        job_id: Option<String>,
    ) -> Result<ScheduledJob, ScheduleError> {
        if !self.coordinator.has_adapter(adapter_id) {
            return Err(ScheduleError::UnknownAdapter(adapter_id.to_string()));
        }
        let expression = to_cron_expression(trigger_spec)?;
        let schedule =
            Schedule::from_str(&expression).map_err(|e| invalid(trigger_spec, e.to_string()))?;
        let job_id = job_id.unwrap_or_else(|| format!("{adapter_id}_custom_{}", Uuid::new_v4().simple()));

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job_id) {
            return Err(ScheduleError::DuplicateJob(job_id));
        }

        let coordinator = self.coordinator.clone();
        let run_adapter = adapter_id.to_string();
        let run_job_id = job_id.clone();
        let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let coordinator = coordinator.clone();
            let adapter_id = run_adapter.clone();
            let job_id = run_job_id.clone();
            Box::pin(async move {
                fire(&coordinator, &adapter_id, &job_id).await;
            })
        })?;
        let uuid = self.scheduler.add(job).await?;

        let scheduled = ScheduledJob {
            job_id: job_id.clone(),
            adapter_id: adapter_id.to_string(),
            trigger_spec: trigger_spec.to_string(),
            next_run_time: next_run(&schedule),
        };
        jobs.insert(
            job_id.clone(),
            JobEntry {
                uuid,
                adapter_id: adapter_id.to_string(),
                trigger_spec: trigger_spec.to_string(),
                schedule,
            },
        );
        info!(job_id = job_id.as_str(), adapter = adapter_id, spec = trigger_spec, "Job scheduled");
        Ok(scheduled)
    }

    /// Remove a job. Returns false when no such job exists or the scheduler
    /// refused to drop it; in the latter case the job stays listed.
    pub async fn remove_job(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get(job_id) else {
            return false;
        };
        if let Err(e) = self.scheduler.remove(&entry.uuid).await {
            warn!(job_id, error = %e, "Failed to unregister job from scheduler");
            return false;
        }
        let adapter_id = jobs
            .remove(job_id)
            .map(|entry| entry.adapter_id)
            .unwrap_or_default();
        info!(job_id, adapter = adapter_id.as_str(), "Job removed");
        true
    }

    /// Registered jobs, soonest first.
    pub async fn list_jobs(&self) -> Vec<ScheduledJob> {
        let jobs = self.jobs.lock().await;
        let mut listed: Vec<ScheduledJob> = jobs
            .iter()
            .map(|(job_id, entry)| ScheduledJob {
                job_id: job_id.clone(),
                adapter_id: entry.adapter_id.clone(),
                trigger_spec: entry.trigger_spec.clone(),
                next_run_time: next_run(&entry.schedule),
            })
            .collect();
        listed.sort_by(|a, b| {
            a.next_run_time
                .cmp(&b.next_run_time)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        listed
    }

    /// Register the daily triggers: one per configured hour for every
    /// adapter, each adapter offset by the stagger. Jobs that already exist
    /// are left alone. Adapters missing credentials are still scheduled; their
    /// runs degrade to empty results until a key is configured.
    pub async fn bootstrap_defaults(&self) -> Result<Vec<ScheduledJob>, ScheduleError> {
        let mut added = Vec::new();
        for (index, descriptor) in self.coordinator.descriptors().iter().enumerate() {
            if !descriptor.schedulable() {
                warn!(
                    adapter = descriptor.id.as_str(),
                    "Credentials not configured, scheduled runs will return no records"
                );
            }
            let offset = index as u32 * self.stagger_minutes;
            for &hour in &self.daily_run_hours {
                let total = hour * 60 + offset;
                let (hour, minute) = ((total / 60) % 24, total % 60);
                let spec = format!("{minute} {hour} * * *");
                let job_id = format!("{}_daily_{:02}{:02}", descriptor.id, hour, minute);
                match self.add_job(&descriptor.id, &spec, Some(job_id)).await {
                    Ok(job) => added.push(job),
                    Err(ScheduleError::DuplicateJob(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        info!(jobs = added.len(), "Default schedules registered");
        Ok(added)
    }

    pub async fn start(&self) -> Result<(), ScheduleError> {
        self.scheduler.start().await?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), ScheduleError> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        info!("Scheduler stopped");
        Ok(())
    }
}

/// Body of a cron firing: run the adapter with its default keywords and
/// tag the outcome as scheduled.
pub(crate) async fn fire(
    coordinator: &RunCoordinator,
    adapter_id: &str,
    job_id: &str,
) -> AdapterRunOutcome {
    info!(job_id, adapter = adapter_id, "Scheduled run firing");
    let outcome = coordinator
        .run_one(adapter_id, None, TriggeredBy::Scheduled)
        .await;
    if !outcome.success {
        tracing::error!(
            job_id,
            adapter = adapter_id,
            error = outcome.error.as_deref().unwrap_or_default(),
            "Scheduled run failed"
        );
    }
    outcome
}
