//! Record types for storing data.
//!
//! A record is an untyped JSON object with a mandatory string `id`. The
//! engine enforces nothing beyond that; shape is agreed on by the callers of
//! each collection.

use crate::{error::Result, Error, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a record, excluding its `id`.
pub type Fields = Map<String, Value>;

/// Name of the identity field in the persisted layout.
pub const ID_FIELD: &str = "id";

/// A single document in a collection.
///
/// Serializes flat: `{"id": "...", "name": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the collection
    pub id: RecordId,
    /// Every other field
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a record. An `id` key inside `fields` is discarded.
    pub fn new(id: impl Into<RecordId>, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Parse a record from a JSON object carrying a string `id`.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut fields = fields_of(value)?;
        match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => Ok(Self { id, fields }),
            Some(other) => Err(Error::InvalidRecord(format!(
                "`id` must be a string, got {}",
                kind_of(&other)
            ))),
            None => Err(Error::InvalidRecord("missing `id` field".into())),
        }
    }

    /// Convert to the flat JSON object layout.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }

    /// Get a field by name. `"id"` resolves to the record's id.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Shallow merge: every field in `patch` overwrites, others are kept.
    ///
    /// The `id` is immutable; a patch carrying one is applied without it.
    pub fn merge(&mut self, patch: &Fields) {
        for (key, value) in patch {
            if key != ID_FIELD {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Strip a value down to a field map for use as a payload or patch.
pub fn fields_of(value: Value) -> Result<Fields> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidRecord(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
