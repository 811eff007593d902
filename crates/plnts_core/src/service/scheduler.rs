//! Interval-driven runner for the reconciliation jobs.
//!
//! # Responsibility
//! - Tick each job on its own interval until shut down.
//! - Keep job errors and panics inside the runner.
//!
//! # Invariants
//! - The runner owns the store connection for its whole life; jobs borrow it
//!   on the blocking pool, one at a time.
//! - Jobs run sequentially; a job never overlaps itself or the other job.
//! - Due ticks win over shutdown, so a pending job finishes its run first.

use super::reconcile::{JobOutcome, Reconciler};
use crate::config::SchedulerConfig;
use crate::model::brain::Job;
use crate::time::Clock;
use log::{error, info};
use rusqlite::Connection;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

const THREAD_NAME: &str = "plnts-scheduler";

pub struct Scheduler;

impl Scheduler {
    /// Starts the runner and returns its handle.
    ///
    /// With `run_on_start`, both jobs tick once immediately; their brain
    /// gates still apply.
    pub fn register(
        conn: Connection,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> io::Result<SchedulerHandle> {
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        let runtime = Builder::new_current_thread().enable_time().build()?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let jobs = Arc::new(JobContext {
            conn: Mutex::new(conn),
            clock,
            config,
        });

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || drive(runtime, jobs, shutdown_rx))?;

        Ok(SchedulerHandle {
            shutdown_tx,
            thread: Some(thread),
        })
    }
}

/// Owner of a running scheduler; dropping it also stops the runner.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals the runner and waits for its current job to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Full or closed both mean the runner is already stopping.
        let _ = self.shutdown_tx.try_send(());
        if thread.join().is_err() {
            error!("event=scheduler_stop module=scheduler status=error error_code=thread_panicked");
            return;
        }
        info!("event=scheduler_stop module=scheduler status=ok");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct JobContext {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl JobContext {
    fn run(&self, job: Job) -> JobOutcome {
        // A panicked job leaves no open transaction behind.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Reconciler::new(&conn, self.clock.as_ref(), self.config.clone()).run(job)
    }
}

fn drive(runtime: Runtime, jobs: Arc<JobContext>, shutdown: mpsc::Receiver<()>) {
    runtime.block_on(run_loop(jobs, shutdown));
}

async fn run_loop(jobs: Arc<JobContext>, mut shutdown: mpsc::Receiver<()>) {
    let alert_interval = jobs.config.alert_interval();
    let care_event_interval = jobs.config.care_event_interval();
    let mut alert_timer = job_timer(alert_interval, jobs.config.run_on_start);
    let mut care_event_timer = job_timer(care_event_interval, jobs.config.run_on_start);

    info!(
        "event=scheduler_start module=scheduler status=ok alert_interval_secs={} care_event_interval_secs={}",
        alert_interval.as_secs(),
        care_event_interval.as_secs()
    );

    loop {
        tokio::select! {
            biased;
            _ = alert_timer.tick() => {
                run_guarded(&jobs, Job::PlantAlertCheck).await;
            }
            _ = care_event_timer.tick() => {
                run_guarded(&jobs, Job::PlantCareEventCheck).await;
            }
            _ = shutdown.recv() => {
                info!("event=scheduler_shutdown module=scheduler status=ok");
                break;
            }
        }
    }
}

fn job_timer(period: Duration, run_on_start: bool) -> Interval {
    let first_tick = if run_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut timer = time::interval_at(first_tick, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn run_guarded(jobs: &Arc<JobContext>, job: Job) -> Option<JobOutcome> {
    let context = Arc::clone(jobs);
    match task::spawn_blocking(move || context.run(job)).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            let status = if err.is_panic() { "panicked" } else { "cancelled" };
            error!(
                "event=job_run module=scheduler status={} job={} error={}",
                status,
                job.name(),
                err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::config::SchedulerConfig;
    use crate::db::open_store;
    use crate::model::brain::{Brain, Job, JobStatus};
    use crate::repo::{Filter, Table};
    use crate::time::{Clock, ManualClock};
    use std::sync::Arc;

    #[test]
    fn runs_both_jobs_on_start_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live.db");
        let history = dir.path().join("history.db");

        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
        let handle = Scheduler::register(
            open_store(&live, &history).unwrap(),
            Arc::clone(&clock),
            SchedulerConfig::default(),
        )
        .unwrap();
        handle.shutdown();

        let conn = open_store(&live, &history).unwrap();
        let brains = Table::<Brain>::new(&conn).get_many(&Filter::new(), 10).unwrap();
        assert_eq!(brains.len(), 1);
        for job in [Job::PlantAlertCheck, Job::PlantCareEventCheck] {
            let run = brains[0].run(job);
            assert_eq!(run.status, JobStatus::Success);
            assert_eq!(run.last_run, Some(clock.now_ms()));
        }
    }

    #[test]
    fn deferred_start_runs_nothing_before_first_interval() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live.db");
        let history = dir.path().join("history.db");
        let config = SchedulerConfig {
            run_on_start: false,
            ..SchedulerConfig::default()
        };

        let handle = Scheduler::register(
            open_store(&live, &history).unwrap(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            config,
        )
        .unwrap();
        assert!(handle.is_running());
        handle.shutdown();

        let conn = open_store(&live, &history).unwrap();
        assert_eq!(Table::<Brain>::new(&conn).count(&Filter::new()).unwrap(), 0);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig {
            alert_interval_secs: 0,
            ..SchedulerConfig::default()
        };

        let err = Scheduler::register(
            open_store(&dir.path().join("live.db"), &dir.path().join("history.db")).unwrap(),
            Arc::new(ManualClock::new(0)),
            config,
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
