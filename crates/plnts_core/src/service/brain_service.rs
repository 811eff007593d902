//! Access to the job bookkeeping singleton.
//!
//! # Responsibility
//! - Lazily create the single `brain` document.
//! - Persist per-job run stamps through the regular table gateway.
//!
//! # Invariants
//! - Concurrent lazy creation converges on one document: the store's
//!   singleton index rejects the loser, which re-reads the winner.

use crate::model::brain::{Brain, Job, JobStatus};
use crate::repo::{Filter, RepoError, RepoResult, Table};
use crate::time::{Clock, Timestamp};
use log::{info, warn};
use rusqlite::Connection;

pub struct BrainService<'conn> {
    table: Table<'conn, Brain>,
    clock: &'conn dyn Clock,
}

impl<'conn> BrainService<'conn> {
    pub fn new(conn: &'conn Connection, clock: &'conn dyn Clock) -> Self {
        Self {
            table: Table::with_clock(conn, clock),
            clock,
        }
    }

    /// Returns the stored brain, creating it when the collection is empty.
    pub fn get_or_create(&self) -> RepoResult<Brain> {
        if let Some(brain) = self.current()? {
            return Ok(brain);
        }

        let brain = Brain::new(self.clock.now_ms());
        match self.table.create(&brain) {
            Ok(_) => {
                info!(
                    "event=brain_create module=service status=ok id={}",
                    brain.meta.id
                );
                Ok(brain)
            }
            Err(RepoError::Duplicate { .. }) => {
                warn!("event=brain_create module=service status=lost_race");
                self.current()?.ok_or(RepoError::Duplicate {
                    collection: "brain",
                    id: brain.meta.id,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Stamps `job` on `brain` and writes the singleton back.
    pub fn record(
        &self,
        brain: &mut Brain,
        job: Job,
        ran_at: Timestamp,
        duration_seconds: f64,
        status: JobStatus,
    ) -> RepoResult<()> {
        brain.update_check(job, ran_at, duration_seconds, status);
        self.table.update(brain.meta.id, brain)?;
        Ok(())
    }

    fn current(&self) -> RepoResult<Option<Brain>> {
        Ok(self.table.get_many(&Filter::new(), 1)?.into_iter().next())
    }
}
