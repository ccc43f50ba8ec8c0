//! Record types for table data.

use crate::{error::Result, Error, Fields, RecordId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The field name every record is keyed by.
pub const ID_FIELD: &str = "id";

/// A record as read back from a table (the Readable shape).
///
/// Serialized flat: `{"id": "...", "text": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within its table
    pub id: RecordId,
    /// Every other field
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a new record.
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        let mut fields = fields;
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a JSON object carrying an `id`.
    ///
    /// Numeric ids are accepted and stored as their decimal string.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidPayload("record must be an object".into()));
        };
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(Error::InvalidPayload(format!(
                    "record id must be a string, got {other}"
                )))
            }
            None => return Err(Error::InvalidPayload("record has no id".into())),
        };
        Ok(Self { id, fields })
    }

    /// Render the record as a flat JSON object.
    pub fn to_value(&self) -> Value {
        let mut obj = Fields::with_capacity(self.fields.len() + 1);
        obj.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Get a field value; `id` resolves to the record id.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Borrow a field value without cloning. Does not resolve `id`.
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Shallow-merge a patch into this record. An `id` in the patch is ignored.
    pub fn merge(&mut self, patch: &Fields) {
        for (k, v) in patch {
            if k == ID_FIELD {
                continue;
            }
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// Keep only the selected fields. `id` always survives.
    pub fn project(&self, select: &[String]) -> Record {
        let fields = self
            .fields
            .iter()
            .filter(|(k, _)| select.iter().any(|s| s == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Record {
            id: self.id.clone(),
            fields,
        }
    }

    /// Decode into a caller-defined Readable struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_value()).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Encode a caller-defined Readable struct. It must serialize an `id`.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        Self::from_value(value)
    }
}

/// Encode a caller-defined Writable struct into the field map adapters accept.
pub fn writable<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))? {
        Value::Object(fields) => Ok(fields),
        _ => Err(Error::InvalidPayload(
            "writable data must serialize to an object".into(),
        )),
    }
}

/// Extract a caller-supplied id from writable data, if any.
pub(crate) fn supplied_id(data: &Fields) -> Result<Option<RecordId>> {
    match data.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(Error::InvalidPayload(format!("invalid id: {other}"))),
    }
}
