//! Plant, care plan and care event models.
//!
//! # Invariants
//! - Care plan intervals are whole days and greater than zero when set.
//! - A care event is immutable once recorded; its natural key is
//!   `(plant_id, event_type, performed_on)`.

use super::alert::AlertType;
use super::{EntityId, EntityMeta, ValidationError};
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::{Timestamp, DAY_MS};
use serde::{Deserialize, Serialize};

/// One of the four tracked care dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareKind {
    Water,
    Fertilize,
    Repot,
    Cleanse,
}

impl CareKind {
    pub const ALL: [CareKind; 4] = [
        CareKind::Water,
        CareKind::Fertilize,
        CareKind::Repot,
        CareKind::Cleanse,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Fertilize => "fertilize",
            Self::Repot => "repot",
            Self::Cleanse => "cleanse",
        }
    }

    pub fn alert_type(self) -> AlertType {
        match self {
            Self::Water => AlertType::Water,
            Self::Fertilize => AlertType::Fertilize,
            Self::Repot => AlertType::Repot,
            Self::Cleanse => AlertType::Cleanse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default)]
    pub cost: f64,
    /// Pot size in inches.
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub system_id: Option<EntityId>,
    #[serde(default)]
    pub care_plan_id: Option<EntityId>,
    #[serde(default)]
    pub watered_on: Option<Timestamp>,
    #[serde(default)]
    pub fertilized_on: Option<Timestamp>,
    #[serde(default)]
    pub potted_on: Option<Timestamp>,
    #[serde(default)]
    pub cleansed_on: Option<Timestamp>,
    /// Numeric id carried over from the relational era; not client-facing.
    #[serde(default)]
    pub legacy_id: Option<i64>,
}

pub static PLANT_SCHEMA: Schema = entity_schema!(
    "plant",
    [
        SchemaField::new("name"),
        SchemaField::new("cost"),
        SchemaField::new("size"),
        SchemaField::new("system_id"),
        SchemaField::new("care_plan_id"),
        SchemaField::new("watered_on"),
        SchemaField::new("fertilized_on"),
        SchemaField::new("potted_on"),
        SchemaField::new("cleansed_on"),
        SchemaField::new("legacy_id").internal_only(),
    ]
);

impl Plant {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: name.into(),
            cost: 0.0,
            size: 0,
            system_id: None,
            care_plan_id: None,
            watered_on: None,
            fertilized_on: None,
            potted_on: None,
            cleansed_on: None,
            legacy_id: None,
        }
    }

    /// Last time the given care was performed, if ever.
    pub fn last_performed(&self, kind: CareKind) -> Option<Timestamp> {
        match kind {
            CareKind::Water => self.watered_on,
            CareKind::Fertilize => self.fertilized_on,
            CareKind::Repot => self.potted_on,
            CareKind::Cleanse => self.cleansed_on,
        }
    }

    /// Records that the given care was performed at `at`.
    pub fn record_care(&mut self, kind: CareKind, at: Timestamp) {
        let slot = match kind {
            CareKind::Water => &mut self.watered_on,
            CareKind::Fertilize => &mut self.fertilized_on,
            CareKind::Repot => &mut self.potted_on,
            CareKind::Cleanse => &mut self.cleansed_on,
        };
        *slot = Some(at);
        self.meta.touch(at);
    }
}

impl Document for Plant {
    const COLLECTION: &'static str = "plant";

    fn schema() -> &'static Schema {
        &PLANT_SCHEMA
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
                entity: "plant",
                field: "name",
            });
        }
        Ok(())
    }
}

/// Reference data: days allowed between each care action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePlan {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub watering: Option<u32>,
    #[serde(default)]
    pub fertilizing: Option<u32>,
    #[serde(default)]
    pub potting: Option<u32>,
    #[serde(default)]
    pub cleaning: Option<u32>,
}

pub static CARE_PLAN_SCHEMA: Schema = entity_schema!(
    "care_plan",
    [
        SchemaField::new("name"),
        SchemaField::new("watering"),
        SchemaField::new("fertilizing"),
        SchemaField::new("potting"),
        SchemaField::new("cleaning"),
    ]
);

impl CarePlan {
    pub fn new(now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: None,
            watering: None,
            fertilizing: None,
            potting: None,
            cleaning: None,
        }
    }

    pub fn interval_days(&self, kind: CareKind) -> Option<u32> {
        match kind {
            CareKind::Water => self.watering,
            CareKind::Fertilize => self.fertilizing,
            CareKind::Repot => self.potting,
            CareKind::Cleanse => self.cleaning,
        }
    }

    /// Returns whether care performed at `last_performed` is overdue at `now`.
    ///
    /// Care with no interval configured is never overdue.
    pub fn is_overdue(&self, kind: CareKind, last_performed: Timestamp, now: Timestamp) -> bool {
        match self.interval_days(kind) {
            Some(days) => last_performed.saturating_add(i64::from(days) * DAY_MS) < now,
            None => false,
        }
    }
}

impl Document for CarePlan {
    const COLLECTION: &'static str = "care_plan";

    fn schema() -> &'static Schema {
        &CARE_PLAN_SCHEMA
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let intervals = [
            ("watering", self.watering),
            ("fertilizing", self.fertilizing),
            ("potting", self.potting),
            ("cleaning", self.cleaning),
        ];
        for (field, days) in intervals {
            if days == Some(0) {
                return Err(ValidationError::NonPositive {
                    entity: "care_plan",
                    field,
                });
            }
        }
        Ok(())
    }
}

/// Historical record of one care action on one plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantCareEvent {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub plant_id: EntityId,
    pub event_type: CareKind,
    pub performed_on: Timestamp,
    #[serde(default)]
    pub notes: Option<String>,
}

pub static PLANT_CARE_EVENT_SCHEMA: Schema = entity_schema!(
    "plant_care_event",
    [
        SchemaField::new("plant_id").read_only(),
        SchemaField::new("event_type").read_only(),
        SchemaField::new("performed_on").read_only(),
        SchemaField::new("notes"),
    ]
);

impl PlantCareEvent {
    pub fn new(
        plant_id: EntityId,
        event_type: CareKind,
        performed_on: Timestamp,
        notes: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            meta: EntityMeta::new(now),
            plant_id,
            event_type,
            performed_on,
            notes,
        }
    }
}

impl Document for PlantCareEvent {
    const COLLECTION: &'static str = "plant_care_event";

    fn schema() -> &'static Schema {
        &PLANT_CARE_EVENT_SCHEMA
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::{CareKind, CarePlan, Plant};
    use crate::time::DAY_MS;

    #[test]
    fn overdue_only_after_full_interval() {
        let mut plan = CarePlan::new(0);
        plan.watering = Some(7);

        assert!(!plan.is_overdue(CareKind::Water, 0, 7 * DAY_MS));
        assert!(plan.is_overdue(CareKind::Water, 0, 7 * DAY_MS + 1));
        assert!(!plan.is_overdue(CareKind::Repot, 0, 1_000 * DAY_MS));
    }

    #[test]
    fn record_care_sets_matching_timestamp() {
        let mut plant = Plant::new("fern", 1);
        plant.record_care(CareKind::Repot, 50);

        assert_eq!(plant.last_performed(CareKind::Repot), Some(50));
        assert_eq!(plant.last_performed(CareKind::Water), None);
        assert_eq!(plant.meta.updated_on, 50);
    }
}
