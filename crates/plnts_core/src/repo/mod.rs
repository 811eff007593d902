//! Repository layer over the document store.
//!
//! # Responsibility
//! - Provide one typed gateway (`Table`) per entity collection.
//! - Isolate SQL and JSON-path details from services.
//!
//! # Invariants
//! - Repository writes enforce `Document::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Duplicate`) in
//!   addition to DB transport errors.

pub mod filter;
pub mod table;

pub use filter::Filter;
pub use table::{ArchiveStage, RepoError, RepoResult, Table};
