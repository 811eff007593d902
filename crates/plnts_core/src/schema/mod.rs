//! Field visibility and nesting descriptors for wire rendering and patching.
//!
//! # Responsibility
//! - Describe, per entity type, which fields clients may see and write.
//! - Render stored documents to client wire records (`read`).
//! - Apply partial client updates onto stored documents (`patch`).
//!
//! # Invariants
//! - `internal_only` fields never appear in `read` output.
//! - `read_only` and `internal_only` fields are never written by `patch`.
//! - `patch` never removes keys absent from the incoming record.
//! - Nested entity elements created by `patch` are stamped with the caller's
//!   `now`, never the wall clock.
//! - Recursion deeper than [`MAX_DEPTH`] nested levels is a hard error.

use crate::time::Timestamp;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod document;

pub use document::{to_record, Document};

/// JSON object exchanged with clients and stored as the document body.
pub type WireRecord = serde_json::Map<String, Value>;

/// Deepest nesting level `read`/`patch` will descend into.
pub const MAX_DEPTH: usize = 5;

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug)]
pub enum SchemaError {
    /// Nested data descends past [`MAX_DEPTH`]; indicates a cyclic or
    /// misconfigured schema.
    DepthExceeded { schema: &'static str, depth: usize },
    /// Entity did not serialize to a JSON object.
    NotAnObject { schema: &'static str },
    /// Patched document no longer decodes into the entity type.
    Invalid {
        schema: &'static str,
        message: String,
    },
    Encode(serde_json::Error),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthExceeded { schema, depth } => write!(
                f,
                "schema `{schema}` nested deeper than {MAX_DEPTH} levels (depth {depth})"
            ),
            Self::NotAnObject { schema } => {
                write!(f, "schema `{schema}` entity is not a JSON object")
            }
            Self::Invalid { schema, message } => {
                write!(f, "invalid `{schema}` document after patch: {message}")
            }
            Self::Encode(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Per-field visibility and nesting flags.
#[derive(Clone, Copy)]
pub struct SchemaField {
    pub name: &'static str,
    /// Server-assigned; rendered by `read`, ignored by `patch`.
    pub read_only: bool,
    /// Never rendered to clients and never accepted from them.
    pub internal_only: bool,
    /// Schema of an embedded sub-entity or embedded list of sub-entities.
    pub nested: Option<&'static Schema>,
}

impl SchemaField {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            read_only: false,
            internal_only: false,
            nested: None,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub const fn internal_only(mut self) -> Self {
        self.internal_only = true;
        self
    }

    pub const fn nested(mut self, schema: &'static Schema) -> Self {
        self.nested = Some(schema);
        self
    }

    fn writable(&self) -> bool {
        !self.read_only && !self.internal_only
    }
}

// Nested schemas may be cyclic; print only their names.
impl std::fmt::Debug for SchemaField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaField")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("internal_only", &self.internal_only)
            .field("nested", &self.nested.map(|schema| schema.name))
            .finish()
    }
}

/// Named, ordered field descriptor for one entity type.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

/// Builds a [`Schema`] whose leading fields are the shared, server-managed
/// entity fields (`id`, timestamps, lifecycle).
macro_rules! entity_schema {
    ($name:expr, [$($field:expr),* $(,)?]) => {
        $crate::schema::Schema {
            name: $name,
            fields: &[
                $crate::schema::SchemaField::new("id").read_only(),
                $crate::schema::SchemaField::new("created_on").read_only(),
                $crate::schema::SchemaField::new("updated_on").read_only(),
                $crate::schema::SchemaField::new("banished").read_only(),
                $crate::schema::SchemaField::new("banished_on").read_only(),
                $crate::schema::SchemaField::new("banished_cause").read_only(),
                $($field),*
            ],
        }
    };
}

pub(crate) use entity_schema;

impl Schema {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Renders a stored document into its client wire form.
    ///
    /// Output keys follow schema order; keys missing from `doc` are omitted.
    pub fn read(&self, doc: &WireRecord) -> SchemaResult<WireRecord> {
        self.read_at(doc, 0)
    }

    /// Applies a partial wire update onto a stored document in place.
    ///
    /// Nested lists pair elements by position and take the incoming length;
    /// elements with no stored counterpart are constructed from the incoming
    /// record alone; entity elements among them get a fresh id and `now`
    /// timestamps.
    pub fn patch(&self, doc: &mut WireRecord, wire: &WireRecord, now: Timestamp) -> SchemaResult<()> {
        self.patch_at(doc, wire, now, 0)
    }

    fn read_at(&self, doc: &WireRecord, depth: usize) -> SchemaResult<WireRecord> {
        self.guard_depth(depth)?;

        let mut rendered = WireRecord::new();
        for field in self.fields {
            if field.internal_only {
                continue;
            }
            let Some(value) = doc.get(field.name) else {
                continue;
            };
            let value = match field.nested {
                Some(nested) => nested.read_value(value, depth + 1)?,
                None => value.clone(),
            };
            rendered.insert(field.name.to_string(), value);
        }
        Ok(rendered)
    }

    fn read_value(&self, value: &Value, depth: usize) -> SchemaResult<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(record) => self.read_at(record, depth).map(Value::Object),
                    other => Ok(other.clone()),
                })
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(record) => self.read_at(record, depth).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn patch_at(
        &self,
        doc: &mut WireRecord,
        wire: &WireRecord,
        now: Timestamp,
        depth: usize,
    ) -> SchemaResult<()> {
        self.guard_depth(depth)?;

        for (key, incoming) in wire {
            let Some(field) = self.field(key) else {
                continue;
            };
            if !field.writable() {
                continue;
            }
            match field.nested {
                None => {
                    doc.insert(key.clone(), incoming.clone());
                }
                Some(nested) => {
                    let slot = doc.entry(key.clone()).or_insert(Value::Null);
                    let current = slot.take();
                    *slot = nested.patch_value(current, incoming, now, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn patch_value(
        &self,
        current: Value,
        incoming: &Value,
        now: Timestamp,
        depth: usize,
    ) -> SchemaResult<Value> {
        match incoming {
            Value::Array(items) => {
                let mut stored = match current {
                    Value::Array(stored) => stored.into_iter(),
                    _ => Vec::new().into_iter(),
                };
                let mut merged = Vec::with_capacity(items.len());
                for item in items {
                    let existing = stored.next().unwrap_or(Value::Null);
                    merged.push(self.patch_element(existing, item, now, depth)?);
                }
                Ok(Value::Array(merged))
            }
            Value::Object(_) => self.patch_element(current, incoming, now, depth),
            other => Ok(other.clone()),
        }
    }

    fn patch_element(
        &self,
        current: Value,
        incoming: &Value,
        now: Timestamp,
        depth: usize,
    ) -> SchemaResult<Value> {
        let Value::Object(wire) = incoming else {
            return Ok(incoming.clone());
        };
        let mut record = match current {
            Value::Object(record) => record,
            _ => self.new_element(now),
        };
        self.patch_at(&mut record, wire, now, depth)?;
        Ok(Value::Object(record))
    }

    /// Empty record for a constructed element; entity schemas get identity
    /// and timestamps up front since `patch` never writes them.
    fn new_element(&self, now: Timestamp) -> WireRecord {
        let mut record = WireRecord::new();
        if self.field("created_on").is_some() {
            record.insert("id".to_string(), Value::from(uuid::Uuid::new_v4().to_string()));
            record.insert("created_on".to_string(), Value::from(now));
            record.insert("updated_on".to_string(), Value::from(now));
            record.insert("banished".to_string(), Value::Bool(false));
        }
        record
    }

    fn guard_depth(&self, depth: usize) -> SchemaResult<()> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::DepthExceeded {
                schema: self.name,
                depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Schema, SchemaError, SchemaField, WireRecord, MAX_DEPTH};
    use serde_json::{json, Value};

    static LEAF: Schema = Schema {
        name: "leaf",
        fields: &[
            SchemaField::new("id").read_only(),
            SchemaField::new("label"),
            SchemaField::new("secret").internal_only(),
        ],
    };

    static ROOT: Schema = Schema {
        name: "root",
        fields: &[
            SchemaField::new("id").read_only(),
            SchemaField::new("title"),
            SchemaField::new("token").internal_only(),
            SchemaField::new("items").nested(&LEAF),
            SchemaField::new("head").nested(&LEAF),
        ],
    };

    static NODE: Schema = Schema {
        name: "node",
        fields: &[SchemaField::new("child").nested(&NODE)],
    };

    fn record(value: Value) -> WireRecord {
        match value {
            Value::Object(record) => record,
            other => panic!("expected object, got {other}"),
        }
    }

    fn chain(levels: usize) -> WireRecord {
        let mut value = json!({});
        for _ in 0..levels {
            value = json!({ "child": value });
        }
        record(value)
    }

    #[test]
    fn read_hides_internal_fields_at_every_level() {
        let doc = record(json!({
            "id": 1,
            "title": "t",
            "token": "hidden",
            "items": [{ "id": 2, "label": "a", "secret": "x" }],
            "head": { "id": 3, "label": "h", "secret": "y" },
            "undeclared": true
        }));

        let wire = ROOT.read(&doc).unwrap();
        assert_eq!(
            Value::Object(wire),
            json!({
                "id": 1,
                "title": "t",
                "items": [{ "id": 2, "label": "a" }],
                "head": { "id": 3, "label": "h" }
            })
        );
    }

    #[test]
    fn read_follows_schema_order() {
        let doc = record(json!({ "title": "t", "id": 1 }));
        let wire = ROOT.read(&doc).unwrap();
        let keys: Vec<&str> = wire.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "title"]);
    }

    #[test]
    fn patch_skips_read_only_internal_and_unknown_keys() {
        let mut doc = record(json!({ "id": 1, "title": "old", "token": "keep" }));
        ROOT.patch(
            &mut doc,
            &record(json!({ "id": 99, "title": "new", "token": "leak", "bogus": 1 })),
            0,
        )
        .unwrap();

        assert_eq!(
            Value::Object(doc),
            json!({ "id": 1, "title": "new", "token": "keep" })
        );
    }

    #[test]
    fn patch_pairs_list_elements_by_position() {
        let mut doc = record(json!({
            "items": [
                { "id": 1, "label": "a", "secret": "s1" },
                { "id": 2, "label": "b", "secret": "s2" }
            ]
        }));
        ROOT.patch(
            &mut doc,
            &record(json!({ "items": [{ "id": 50, "label": "A" }, {}, { "label": "c" }] })),
            0,
        )
        .unwrap();

        assert_eq!(
            doc["items"],
            json!([
                { "id": 1, "label": "A", "secret": "s1" },
                { "id": 2, "label": "b", "secret": "s2" },
                { "label": "c" }
            ])
        );
    }

    #[test]
    fn patch_constructs_missing_nested_object() {
        let mut doc = record(json!({ "title": "t" }));
        ROOT.patch(&mut doc, &record(json!({ "head": { "id": 7, "label": "new" } })), 0)
            .unwrap();
        assert_eq!(doc["head"], json!({ "label": "new" }));
        assert_eq!(doc["title"], "t");
    }

    #[test]
    fn read_of_patch_of_read_is_stable() {
        let doc = record(json!({
            "id": 1,
            "title": "t",
            "token": "k",
            "items": [{ "id": 2, "label": "a", "secret": "s" }],
            "head": { "id": 3, "label": "h" }
        }));
        let before = ROOT.read(&doc).unwrap();

        let mut patched = doc.clone();
        ROOT.patch(&mut patched, &before, 0).unwrap();

        assert_eq!(ROOT.read(&patched).unwrap(), before);
        assert_eq!(patched, doc);
    }

    #[test]
    fn cyclic_schema_within_depth_is_fine() {
        let doc = chain(MAX_DEPTH);
        assert!(NODE.read(&doc).is_ok());

        let mut target = WireRecord::new();
        assert!(NODE.patch(&mut target, &chain(MAX_DEPTH), 0).is_ok());
    }

    #[test]
    fn runaway_nesting_is_a_hard_error() {
        let err = NODE.read(&chain(MAX_DEPTH + 2)).unwrap_err();
        assert!(matches!(err, SchemaError::DepthExceeded { schema: "node", .. }));

        let mut target = WireRecord::new();
        let err = NODE.patch(&mut target, &chain(MAX_DEPTH + 2), 0).unwrap_err();
        assert!(matches!(err, SchemaError::DepthExceeded { .. }));
    }
}
