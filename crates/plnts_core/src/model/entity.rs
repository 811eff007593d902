//! Shared identity and lifecycle shape of every persisted entity.
//!
//! # Responsibility
//! - Define the identity/timestamp block flattened into each entity.
//! - Own the single archive transition (`banish`).
//!
//! # Invariants
//! - `id` is assigned at construction and never reassigned.
//! - `updated_on` is refreshed on every mutation through [`EntityMeta::touch`].
//! - `Lifecycle::Archived` is the only soft-delete state; legacy
//!   `deprecated*` keys are read as `Archived` and never written back.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every persisted entity.
pub type EntityId = Uuid;

/// Soft-delete state shared by all entity types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Active,
    Archived {
        on: Timestamp,
        cause: Option<String>,
    },
}

/// Identity, timestamps and lifecycle of an entity.
///
/// Serialized flat as `id`, `created_on`, `updated_on`, `banished`,
/// `banished_on` and `banished_cause`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntityMetaRepr", into = "EntityMetaRepr")]
pub struct EntityMeta {
    pub id: EntityId,
    pub created_on: Timestamp,
    pub updated_on: Timestamp,
    pub lifecycle: Lifecycle,
}

impl EntityMeta {
    /// Creates metadata with a fresh id, stamped at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self::with_id(Uuid::new_v4(), now)
    }

    /// Creates metadata for an identity that already exists elsewhere.
    pub fn with_id(id: EntityId, now: Timestamp) -> Self {
        Self {
            id,
            created_on: now,
            updated_on: now,
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_on = now;
    }

    /// Marks this entity archived in memory.
    ///
    /// The caller persists the change; this is not transactional on its own.
    /// Re-banishing keeps the original `banished_on` stamp.
    pub fn banish(&mut self, now: Timestamp, cause: Option<&str>) {
        if let Lifecycle::Archived { .. } = self.lifecycle {
            return;
        }
        self.lifecycle = Lifecycle::Archived {
            on: now,
            cause: cause.map(str::to_string),
        };
        self.touch(now);
    }

    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active)
    }

    pub fn banished_on(&self) -> Option<Timestamp> {
        match self.lifecycle {
            Lifecycle::Active => None,
            Lifecycle::Archived { on, .. } => Some(on),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct EntityMetaRepr {
    id: EntityId,
    created_on: Timestamp,
    updated_on: Timestamp,
    #[serde(default)]
    banished: bool,
    #[serde(default)]
    banished_on: Option<Timestamp>,
    #[serde(default)]
    banished_cause: Option<String>,
    #[serde(default, skip_serializing)]
    deprecated: Option<bool>,
    #[serde(default, skip_serializing)]
    deprecated_on: Option<Timestamp>,
    #[serde(default, skip_serializing)]
    deprecated_cause: Option<String>,
}

impl From<EntityMetaRepr> for EntityMeta {
    fn from(repr: EntityMetaRepr) -> Self {
        let lifecycle = if repr.banished {
            Lifecycle::Archived {
                on: repr.banished_on.unwrap_or(repr.updated_on),
                cause: repr.banished_cause,
            }
        } else if repr.deprecated == Some(true) {
            Lifecycle::Archived {
                on: repr.deprecated_on.unwrap_or(repr.updated_on),
                cause: repr.deprecated_cause,
            }
        } else {
            Lifecycle::Active
        };

        Self {
            id: repr.id,
            created_on: repr.created_on,
            updated_on: repr.updated_on,
            lifecycle,
        }
    }
}

impl From<EntityMeta> for EntityMetaRepr {
    fn from(meta: EntityMeta) -> Self {
        let (banished, banished_on, banished_cause) = match meta.lifecycle {
            Lifecycle::Active => (false, None, None),
            Lifecycle::Archived { on, cause } => (true, Some(on), cause),
        };

        Self {
            id: meta.id,
            created_on: meta.created_on,
            updated_on: meta.updated_on,
            banished,
            banished_on,
            banished_cause,
            deprecated: None,
            deprecated_on: None,
            deprecated_cause: None,
        }
    }
}
