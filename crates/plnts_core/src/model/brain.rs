//! Background job bookkeeping singleton.
//!
//! # Invariants
//! - Exactly one `brain` document exists once any job has run.
//! - Only the reconciliation scheduler mutates it.

use super::EntityMeta;
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Background jobs tracked by [`Brain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    PlantAlertCheck,
    PlantCareEventCheck,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Self::PlantAlertCheck => "plant_alert_check",
            Self::PlantCareEventCheck => "plant_care_event_check",
        }
    }
}

/// Terminal status of a job's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    #[default]
    NeverRun,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NeverRun => "never_run",
        }
    }
}

/// Snapshot of one job's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobRun {
    pub last_run: Option<Timestamp>,
    pub duration_seconds: Option<f64>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brain {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub plant_alert_check_last_run: Option<Timestamp>,
    #[serde(default)]
    pub plant_alert_check_duration_seconds: Option<f64>,
    #[serde(default)]
    pub plant_alert_check_status: JobStatus,
    #[serde(default)]
    pub plant_care_event_check_last_run: Option<Timestamp>,
    #[serde(default)]
    pub plant_care_event_check_duration_seconds: Option<f64>,
    #[serde(default)]
    pub plant_care_event_check_status: JobStatus,
}

pub static BRAIN_SCHEMA: Schema = entity_schema!(
    "brain",
    [
        SchemaField::new("plant_alert_check_last_run").read_only(),
        SchemaField::new("plant_alert_check_duration_seconds").read_only(),
        SchemaField::new("plant_alert_check_status").read_only(),
        SchemaField::new("plant_care_event_check_last_run").read_only(),
        SchemaField::new("plant_care_event_check_duration_seconds").read_only(),
        SchemaField::new("plant_care_event_check_status").read_only(),
    ]
);

impl Brain {
    pub fn new(now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            plant_alert_check_last_run: None,
            plant_alert_check_duration_seconds: None,
            plant_alert_check_status: JobStatus::NeverRun,
            plant_care_event_check_last_run: None,
            plant_care_event_check_duration_seconds: None,
            plant_care_event_check_status: JobStatus::NeverRun,
        }
    }

    pub fn run(&self, job: Job) -> JobRun {
        match job {
            Job::PlantAlertCheck => JobRun {
                last_run: self.plant_alert_check_last_run,
                duration_seconds: self.plant_alert_check_duration_seconds,
                status: self.plant_alert_check_status,
            },
            Job::PlantCareEventCheck => JobRun {
                last_run: self.plant_care_event_check_last_run,
                duration_seconds: self.plant_care_event_check_duration_seconds,
                status: self.plant_care_event_check_status,
            },
        }
    }

    /// Stamps one job's run in memory; the caller persists the singleton.
    pub fn update_check(
        &mut self,
        job: Job,
        ran_at: Timestamp,
        duration_seconds: f64,
        status: JobStatus,
    ) {
        let (last_run, duration, job_status) = match job {
            Job::PlantAlertCheck => (
                &mut self.plant_alert_check_last_run,
                &mut self.plant_alert_check_duration_seconds,
                &mut self.plant_alert_check_status,
            ),
            Job::PlantCareEventCheck => (
                &mut self.plant_care_event_check_last_run,
                &mut self.plant_care_event_check_duration_seconds,
                &mut self.plant_care_event_check_status,
            ),
        };
        *last_run = Some(ran_at);
        *duration = Some(duration_seconds);
        *job_status = status;
        self.meta.touch(ran_at);
    }
}

impl Document for Brain {
    const COLLECTION: &'static str = "brain";

    fn schema() -> &'static Schema {
        &BRAIN_SCHEMA
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::{Brain, Job, JobStatus};

    #[test]
    fn update_check_touches_only_its_job() {
        let mut brain = Brain::new(0);
        brain.update_check(Job::PlantCareEventCheck, 100, 1.5, JobStatus::Failed);

        let run = brain.run(Job::PlantCareEventCheck);
        assert_eq!(run.last_run, Some(100));
        assert_eq!(run.duration_seconds, Some(1.5));
        assert_eq!(run.status, JobStatus::Failed);

        let untouched = brain.run(Job::PlantAlertCheck);
        assert_eq!(untouched.last_run, None);
        assert_eq!(untouched.status, JobStatus::NeverRun);
        assert_eq!(brain.meta.updated_on, 100);
    }
}
