//! Todos with embedded tasks.
//!
//! Todos predate the banish archive and are retired in place with
//! `Table::deprecate`, staying in the live store.

use super::{EntityMeta, ValidationError};
use crate::schema::{entity_schema, Document, Schema, SchemaField};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_on: Option<Timestamp>,
}

pub static TASK_SCHEMA: Schema = entity_schema!(
    "task",
    [
        SchemaField::new("description"),
        SchemaField::new("resolved"),
        SchemaField::new("resolved_on"),
    ]
);

impl Task {
    pub fn new(description: impl Into<String>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            description: description.into(),
            resolved: false,
            resolved_on: None,
        }
    }

    pub fn resolve(&mut self, now: Timestamp) {
        self.resolved = true;
        self.resolved_on = Some(now);
        self.meta.touch(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_on: Option<Timestamp>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

pub static TODO_SCHEMA: Schema = entity_schema!(
    "todo",
    [
        SchemaField::new("name"),
        SchemaField::new("description"),
        SchemaField::new("due_on"),
        SchemaField::new("tasks").nested(&TASK_SCHEMA),
    ]
);

impl Todo {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            meta: EntityMeta::new(now),
            name: name.into(),
            description: None,
            due_on: None,
            tasks: Vec::new(),
        }
    }
}

impl Document for Todo {
    const COLLECTION: &'static str = "todo";

    fn schema() -> &'static Schema {
        &TODO_SCHEMA
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
                entity: "todo",
                field: "name",
            });
        }
        Ok(())
    }
}
