//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate table calls into job-level operations.
//! - Host the background scheduler that drives reconciliation.

pub mod brain_service;
pub mod reconcile;
pub mod scheduler;
