//! Care alerts derived by the reconciliation jobs.
//!
//! # Invariants
//! - At most one live alert exists per `(model_id, alert_type)`; the store
//!   enforces this with a unique index.

use super::{EntityId, EntityMeta};
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Water,
    Fertilize,
    Repot,
    Cleanse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub alert_type: AlertType,
    /// Entity needing care.
    pub model_id: EntityId,
}

pub static ALERT_SCHEMA: Schema = entity_schema!(
    "alert",
    [
        SchemaField::new("alert_type").read_only(),
        SchemaField::new("model_id").read_only(),
    ]
);

impl Alert {
    pub fn new(model_id: EntityId, alert_type: AlertType, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            alert_type,
            model_id,
        }
    }
}

impl Document for Alert {
    const COLLECTION: &'static str = "alert";

    fn schema() -> &'static Schema {
        &ALERT_SCHEMA
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
