//! Table schemas and adapter-boundary validation.
//!
//! The synchronization core itself is schema-agnostic. Adapters may be given a
//! [`Schema`] so that writable data is checked before it reaches storage.

use crate::{error::Result, Error, Fields, TableName, ID_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether `create` must supply this field
    pub required: bool,
    /// Whether callers may set this field (part of the Writable shape)
    pub writable: bool,
}

impl FieldDef {
    /// A required writable field.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            writable: true,
        }
    }

    /// An optional writable field.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            writable: true,
        }
    }

    /// A computed field: readable, never writable by callers.
    pub fn read_only(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            writable: false,
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Json => true,
        };

        if valid || value.is_null() {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Readable/Writable shape of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name
    pub name: TableName,
    /// Field definitions (the Readable shape; writable ones form the Writable shape)
    pub fields: Vec<FieldDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<TableName>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the writable fields.
    pub fn writable_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.writable)
            .map(|f| f.name.as_str())
    }

    /// Validate writable data for `create`. A caller-supplied `id` is allowed.
    pub fn validate_create(&self, data: &Fields) -> Result<()> {
        self.validate_supplied(data, true)?;

        for field in self.fields.iter().filter(|f| f.required && f.writable) {
            match data.get(&field.name) {
                None | Some(serde_json::Value::Null) => {
                    return Err(Error::MissingRequiredField(field.name.clone()))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Validate a partial writable patch for `update`.
    pub fn validate_patch(&self, patch: &Fields) -> Result<()> {
        self.validate_supplied(patch, false)
    }

    fn validate_supplied(&self, data: &Fields, allow_id: bool) -> Result<()> {
        for (name, value) in data {
            if name == ID_FIELD {
                if allow_id {
                    continue;
                }
                return Err(Error::ReadOnlyField(ID_FIELD.to_string()));
            }
            let def = self
                .field(name)
                .ok_or_else(|| Error::UnknownField(name.clone()))?;
            if !def.writable {
                return Err(Error::ReadOnlyField(name.clone()));
            }
            def.validate_type(value)?;
        }
        Ok(())
    }
}

/// Schemas for a set of tables. Tables without a schema are not validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Table schemas by name
    pub tables: HashMap<TableName, TableSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to the schema.
    pub fn add_table(&mut self, table: TableSchema) -> &mut Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Builder-style method to add a table.
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.add_table(table);
        self
    }

    /// Get a table schema by name.
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn validate_create(&self, table: &str, data: &Fields) -> Result<()> {
        match self.tables.get(table) {
            Some(schema) => schema.validate_create(data),
            None => Ok(()),
        }
    }

    pub fn validate_patch(&self, table: &str, patch: &Fields) -> Result<()> {
        match self.tables.get(table) {
            Some(schema) => schema.validate_patch(patch),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn todos() -> TableSchema {
        TableSchema::new(
            "todos",
            vec![
                FieldDef::required("text", FieldType::String),
                FieldDef::optional("completed", FieldType::Bool),
                FieldDef::read_only("createdAt", FieldType::Int),
            ],
        )
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn validate_valid_create() {
        let schema = todos();
        assert!(schema
            .validate_create(&fields(json!({"text": "buy milk"})))
            .is_ok());
        assert!(schema
            .validate_create(&fields(json!({"id": "t1", "text": "a", "completed": true})))
            .is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let result = todos().validate_create(&fields(json!({"completed": false})));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "text"));

        let result = todos().validate_create(&fields(json!({"text": null})));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "text"));
    }

    #[test]
    fn validate_read_only_and_unknown() {
        let result = todos().validate_create(&fields(json!({"text": "a", "createdAt": 1})));
        assert!(matches!(result, Err(Error::ReadOnlyField(f)) if f == "createdAt"));

        let result = todos().validate_patch(&fields(json!({"priority": 1})));
        assert!(matches!(result, Err(Error::UnknownField(f)) if f == "priority"));

        let result = todos().validate_patch(&fields(json!({"id": "other"})));
        assert!(matches!(result, Err(Error::ReadOnlyField(f)) if f == "id"));
    }

    #[test]
    fn validate_wrong_type() {
        let result = todos().validate_patch(&fields(json!({"completed": "yes"})));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "completed"));
    }

    #[test]
    fn patch_does_not_require_fields() {
        assert!(todos()
            .validate_patch(&fields(json!({"completed": true})))
            .is_ok());
    }

    #[test]
    fn unknown_tables_are_not_validated() {
        let schema = Schema::new().with_table(todos());
        assert!(schema
            .validate_create("notes", &fields(json!({"anything": 1})))
            .is_ok());
        assert!(schema.validate_create("todos", &fields(json!({}))).is_err());
    }

    #[test]
    fn writable_fields_exclude_computed() {
        let schema = todos();
        let writable: Vec<_> = schema.writable_fields().collect();
        assert_eq!(writable, vec!["text", "completed"]);
    }
}
