//! Grow systems and the lights attached to them.
//!
//! # Invariants
//! - A light belongs to at most one system through `system_id`.
//! - `container_id` and `url` are host wiring and never leave the store.

use super::{EntityId, EntityMeta, ValidationError};
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Enclosure whose climate and lighting plants share via `Plant::system_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Percent relative humidity.
    #[serde(default)]
    pub target_humidity: f64,
    /// Degrees Fahrenheit.
    #[serde(default)]
    pub target_temperature: f64,
    #[serde(default)]
    pub last_humidity: Option<f64>,
    #[serde(default)]
    pub last_temperature: Option<f64>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Daily light period in hours.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Light distance in inches.
    #[serde(default)]
    pub distance: Option<u32>,
}

pub static SYSTEM_SCHEMA: Schema = entity_schema!(
    "system",
    [
        SchemaField::new("name"),
        SchemaField::new("description"),
        SchemaField::new("target_humidity"),
        SchemaField::new("target_temperature"),
        SchemaField::new("last_humidity"),
        SchemaField::new("last_temperature"),
        SchemaField::new("container_id").internal_only(),
        SchemaField::new("url").internal_only(),
        SchemaField::new("duration"),
        SchemaField::new("distance"),
    ]
);

impl System {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: name.into(),
            description: None,
            target_humidity: 0.0,
            target_temperature: 0.0,
            last_humidity: None,
            last_temperature: None,
            container_id: None,
            url: None,
            duration: None,
            distance: None,
        }
    }
}

impl Document for System {
    const COLLECTION: &'static str = "system";

    fn schema() -> &'static Schema {
        &SYSTEM_SCHEMA
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
                entity: "system",
                field: "name",
            });
        }
        if self.duration == Some(0) {
            return Err(ValidationError::NonPositive {
                entity: "system",
                field: "duration",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub system_id: Option<EntityId>,
}

pub static LIGHT_SCHEMA: Schema = entity_schema!(
    "light",
    [
        SchemaField::new("name"),
        SchemaField::new("cost"),
        SchemaField::new("system_id"),
    ]
);

impl Light {
    pub fn new(name: impl Into<String>, system_id: Option<EntityId>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: name.into(),
            cost: 0.0,
            system_id,
        }
    }
}

impl Document for Light {
    const COLLECTION: &'static str = "light";

    fn schema() -> &'static Schema {
        &LIGHT_SCHEMA
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
                entity: "light",
                field: "name",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Light, System};
    use crate::model::ValidationError;
    use crate::schema::Document;

    #[test]
    fn read_hides_host_wiring() {
        let mut system = System::new("Tent", 1);
        system.container_id = Some("abc123".to_string());
        system.url = Some("http://10.0.0.4".to_string());

        let wire = system.read().unwrap();
        assert!(!wire.contains_key("container_id"));
        assert!(!wire.contains_key("url"));
        assert_eq!(wire["name"], "Tent");
    }

    #[test]
    fn zero_light_period_is_rejected() {
        let mut system = System::new("Shelf", 1);
        system.duration = Some(0);
        assert_eq!(
            system.validate(),
            Err(ValidationError::NonPositive {
                entity: "system",
                field: "duration"
            })
        );
        assert!(Light::new(" ", None, 1).validate().is_err());
    }
}
