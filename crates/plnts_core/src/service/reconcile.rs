//! Background reconciliation jobs over plant care state.
//!
//! # Responsibility
//! - Derive care alerts from plant timestamps and care plan intervals.
//! - Record care events for plant timestamps newer than the last good run.
//! - Stamp every attempt on the brain, including failures.
//!
//! # Invariants
//! - A job never propagates an error to its caller; failures become
//!   `JobOutcome::Failed` plus a `failed` brain stamp.
//! - Both jobs are idempotent: re-running creates nothing new for unchanged
//!   plants, backed by the store's natural-key unique indexes.
//! - `last_run` is the job start time.

use super::brain_service::BrainService;
use crate::config::SchedulerConfig;
use crate::model::alert::{Alert, AlertType};
use crate::model::brain::{Job, JobRun, JobStatus};
use crate::model::plant::{CareKind, CarePlan, Plant, PlantCareEvent};
use crate::model::EntityId;
use crate::repo::{Filter, RepoError, RepoResult, Table};
use crate::schema::Document;
use crate::time::{Clock, Timestamp};
use log::{debug, error, info};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Result of one job invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Gate not yet elapsed since `last_run`; nothing was touched.
    Skipped { last_run: Timestamp },
    Completed { created: usize, duration: Duration },
    Failed { error: String, duration: Duration },
}

impl JobOutcome {
    pub fn created(&self) -> usize {
        match self {
            Self::Completed { created, .. } => *created,
            Self::Skipped { .. } | Self::Failed { .. } => 0,
        }
    }
}

pub struct Reconciler<'conn> {
    conn: &'conn Connection,
    clock: &'conn dyn Clock,
    config: SchedulerConfig,
}

impl<'conn> Reconciler<'conn> {
    pub fn new(conn: &'conn Connection, clock: &'conn dyn Clock, config: SchedulerConfig) -> Self {
        Self {
            conn,
            clock,
            config,
        }
    }

    /// Job A: creates missing alerts for overdue care.
    pub fn manage_plant_alerts(&self) -> JobOutcome {
        self.run(Job::PlantAlertCheck)
    }

    /// Job B: records care events for newly stamped plant timestamps.
    pub fn detect_plant_care_events(&self) -> JobOutcome {
        self.run(Job::PlantCareEventCheck)
    }

    /// Runs `job` behind its gate and records the attempt on the brain.
    pub fn run(&self, job: Job) -> JobOutcome {
        let started_at = Instant::now();
        let now = self.clock.now_ms();
        let brains = BrainService::new(self.conn, self.clock);

        let mut brain = match brains.get_or_create() {
            Ok(brain) => brain,
            Err(err) => {
                error!(
                    "event=job_run module=reconcile status=error job={} error_code=brain_unavailable error={}",
                    job.name(),
                    err
                );
                return JobOutcome::Failed {
                    error: err.to_string(),
                    duration: started_at.elapsed(),
                };
            }
        };

        let previous = brain.run(job);
        if let Some(last_run) = previous.last_run {
            if now.saturating_sub(last_run) < self.gate_ms(job) {
                debug!(
                    "event=job_run module=reconcile status=skipped job={} last_run={}",
                    job.name(),
                    last_run
                );
                return JobOutcome::Skipped { last_run };
            }
        }

        info!(
            "event=job_run module=reconcile status=start job={}",
            job.name()
        );
        let result = match job {
            Job::PlantAlertCheck => self.create_due_alerts(now),
            Job::PlantCareEventCheck => self.record_care_events(now, since(previous)),
        };
        let duration = started_at.elapsed();

        let (status, outcome) = match result {
            Ok(created) => {
                info!(
                    "event=job_run module=reconcile status=ok job={} created={} duration_ms={}",
                    job.name(),
                    created,
                    duration.as_millis()
                );
                (JobStatus::Success, JobOutcome::Completed { created, duration })
            }
            Err(err) => {
                error!(
                    "event=job_run module=reconcile status=error job={} duration_ms={} error={}",
                    job.name(),
                    duration.as_millis(),
                    err
                );
                (
                    JobStatus::Failed,
                    JobOutcome::Failed {
                        error: err.to_string(),
                        duration,
                    },
                )
            }
        };

        if let Err(err) = brains.record(&mut brain, job, now, duration.as_secs_f64(), status) {
            error!(
                "event=job_record module=reconcile status=error job={} job_status={} error={}",
                job.name(),
                status.as_str(),
                err
            );
        }
        outcome
    }

    fn gate_ms(&self, job: Job) -> Timestamp {
        match job {
            Job::PlantAlertCheck => self.config.alert_gate_ms(),
            Job::PlantCareEventCheck => self.config.care_event_gate_ms(),
        }
    }

    fn table<E: Document>(&self) -> Table<'conn, E> {
        Table::with_clock(self.conn, self.clock)
    }

    fn create_due_alerts(&self, now: Timestamp) -> RepoResult<usize> {
        let limit = self.config.scan_limit;
        let alerts = self.table::<Alert>();

        let mut alerted: HashSet<(EntityId, AlertType)> = alerts
            .get_many(&Filter::live(), limit)?
            .into_iter()
            .map(|alert| (alert.model_id, alert.alert_type))
            .collect();

        let plants = self.table::<Plant>().get_many(&Filter::live(), limit)?;
        let plans = self.care_plans_for(&plants)?;

        let mut created = 0;
        for plant in &plants {
            let Some(plan) = plant.care_plan_id.and_then(|id| plans.get(&id)) else {
                continue;
            };

            for kind in CareKind::ALL {
                let key = (plant.meta.id, kind.alert_type());
                if alerted.contains(&key) {
                    continue;
                }
                let Some(last_performed) = plant.last_performed(kind) else {
                    continue;
                };
                if !plan.is_overdue(kind, last_performed, now) {
                    continue;
                }

                match alerts.create(&Alert::new(plant.meta.id, kind.alert_type(), now)) {
                    Ok(_) => {
                        created += 1;
                        alerted.insert(key);
                        info!(
                            "event=alert_create module=reconcile status=ok plant_id={} alert_type={}",
                            plant.meta.id,
                            kind.label()
                        );
                    }
                    Err(RepoError::Duplicate { .. }) => {
                        debug!(
                            "event=alert_create module=reconcile status=duplicate plant_id={} alert_type={}",
                            plant.meta.id,
                            kind.label()
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(created)
    }

    fn care_plans_for(&self, plants: &[Plant]) -> RepoResult<HashMap<EntityId, CarePlan>> {
        let ids: HashSet<EntityId> = plants.iter().filter_map(|plant| plant.care_plan_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = Filter::new().in_("id", ids.iter().map(|id| id.to_string()));
        Ok(self
            .table::<CarePlan>()
            .get_many(&filter, self.config.scan_limit)?
            .into_iter()
            .map(|plan| (plan.meta.id, plan))
            .collect())
    }

    fn record_care_events(&self, now: Timestamp, since: Option<Timestamp>) -> RepoResult<usize> {
        let events = self.table::<PlantCareEvent>();
        let plants = self
            .table::<Plant>()
            .get_many(&Filter::live(), self.config.scan_limit)?;

        let mut created = 0;
        for plant in &plants {
            for kind in CareKind::ALL {
                let Some(performed_on) = plant.last_performed(kind) else {
                    continue;
                };
                if since.is_some_and(|since| performed_on <= since) {
                    continue;
                }

                let event = PlantCareEvent::new(
                    plant.meta.id,
                    kind,
                    performed_on,
                    Some(format!("Detected from plant {} timestamp", kind.label())),
                    now,
                );
                match events.create(&event) {
                    Ok(_) => created += 1,
                    Err(RepoError::Duplicate { .. }) => {
                        debug!(
                            "event=care_event_create module=reconcile status=exists plant_id={} event_type={}",
                            plant.meta.id,
                            kind.label()
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(created)
    }
}

/// Lower bound for care-event detection; unsuccessful runs count as never run.
fn since(previous: JobRun) -> Option<Timestamp> {
    match previous.status {
        JobStatus::Success => previous.last_run,
        JobStatus::Failed | JobStatus::NeverRun => None,
    }
}
