//! Compile-time binding between an entity type, its collection and schema.

use super::{Schema, SchemaError, SchemaResult, WireRecord};
use crate::model::{EntityId, EntityMeta, ValidationError};
use crate::time::Timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Entity type persisted as one document per instance.
///
/// Implementors provide the collection name and a static [`Schema`]; the
/// wire rendering (`read`) and partial update (`patch`) operations are
/// derived from them.
pub trait Document: Serialize + DeserializeOwned {
    /// Physical collection name, shared by live and history databases.
    const COLLECTION: &'static str;

    fn schema() -> &'static Schema;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Type-specific write-path checks.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn id(&self) -> EntityId {
        self.meta().id
    }

    /// Renders this entity for clients.
    fn read(&self) -> SchemaResult<WireRecord> {
        Self::schema().read(&to_record(self, Self::schema())?)
    }

    /// Applies a partial client update in place.
    ///
    /// Embedded elements the update creates are stamped at `now`. On error
    /// the entity is left unchanged.
    fn patch(&mut self, wire: &WireRecord, now: Timestamp) -> SchemaResult<()> {
        let schema = Self::schema();
        let mut record = to_record(self, schema)?;
        schema.patch(&mut record, wire, now)?;
        *self = serde_json::from_value(Value::Object(record)).map_err(|err| {
            SchemaError::Invalid {
                schema: schema.name,
                message: err.to_string(),
            }
        })?;
        Ok(())
    }
}

/// Serializes an entity into its full stored document form.
pub fn to_record<T: Serialize + ?Sized>(entity: &T, schema: &Schema) -> SchemaResult<WireRecord> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        _ => Err(SchemaError::NotAnObject {
            schema: schema.name,
        }),
    }
}
