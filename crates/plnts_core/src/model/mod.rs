//! Persisted entity types for plant care tracking.
//!
//! # Responsibility
//! - Define the canonical document shapes stored per collection.
//! - Bind each type to its collection and wire schema via `Document`.
//!
//! # Invariants
//! - Every entity flattens an [`EntityMeta`] block (identity, timestamps,
//!   lifecycle).
//! - Soft deletion is the single `Lifecycle::Archived` state.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod alert;
pub mod brain;
pub mod entity;
pub mod mix;
pub mod plant;
pub mod system;
pub mod todo;

pub use entity::{EntityId, EntityMeta, Lifecycle};

/// Write-path validation failure for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Entity id is the nil UUID.
    NilId,
    /// Required text field is blank after trim.
    BlankField {
        entity: &'static str,
        field: &'static str,
    },
    /// Count or interval field must be greater than zero.
    NonPositive {
        entity: &'static str,
        field: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "entity id must not be nil"),
            Self::BlankField { entity, field } => {
                write!(f, "{entity}.{field} must not be blank")
            }
            Self::NonPositive { entity, field } => {
                write!(f, "{entity}.{field} must be greater than zero")
            }
        }
    }
}

impl Error for ValidationError {}
