//! Core domain logic for plnts: plant care documents, the archive store and
//! background reconciliation.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;
pub mod time;

pub use config::{ConfigError, CoreConfig, LoggingConfig, SchedulerConfig, StoreConfig};
pub use db::{open_store, open_store_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use model::{EntityId, EntityMeta, Lifecycle, ValidationError};
pub use repo::{ArchiveStage, Filter, RepoError, RepoResult, Table};
pub use schema::{Document, Schema, SchemaError, SchemaField, WireRecord};
pub use service::brain_service::BrainService;
pub use service::reconcile::{JobOutcome, Reconciler};
pub use service::scheduler::{Scheduler, SchedulerHandle};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
