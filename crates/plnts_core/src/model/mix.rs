//! Soil mixes with embedded soil parts.

use super::{EntityId, EntityMeta, ValidationError};
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// One embedded component of a [`Mix`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilPart {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub soil_id: Option<EntityId>,
    /// Relative share of this soil in the mix.
    #[serde(default)]
    pub parts: u32,
}

pub static SOIL_PART_SCHEMA: Schema = entity_schema!(
    "soil_part",
    [SchemaField::new("soil_id"), SchemaField::new("parts")]
);

impl SoilPart {
    pub fn new(soil_id: EntityId, parts: u32, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            soil_id: Some(soil_id),
            parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mix {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub soil_parts: Vec<SoilPart>,
}

pub static MIX_SCHEMA: Schema = entity_schema!(
    "mix",
    [
        SchemaField::new("name"),
        SchemaField::new("description"),
        SchemaField::new("experimental"),
        SchemaField::new("soil_parts").nested(&SOIL_PART_SCHEMA),
    ]
);

impl Mix {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: name.into(),
            description: None,
            experimental: false,
            soil_parts: Vec::new(),
        }
    }
}

impl Document for Mix {
    const COLLECTION: &'static str = "mix";

    fn schema() -> &'static Schema {
        &MIX_SCHEMA
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankField {
                entity: "mix",
                field: "name",
            });
        }
        if self.soil_parts.iter().any(|part| part.parts == 0) {
            return Err(ValidationError::NonPositive {
                entity: "soil_part",
                field: "parts",
            });
        }
        Ok(())
    }
}
