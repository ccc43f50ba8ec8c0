//! Index snapshots: a serializable copy of one table's index.
//!
//! Used to seed a [`TableSync`](crate::TableSync) with data rendered
//! elsewhere (for example by a server) and to persist an index between runs.
//! Records are kept in a `BTreeMap` so the JSON form is deterministic.

use crate::{error::Result, Error, Record, RecordId, TableIndex, TableName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Point-in-time copy of a table index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub format_version: u32,
    pub table: TableName,
    pub records: BTreeMap<RecordId, Record>,
}

impl IndexSnapshot {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            table: table.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        for record in records {
            self.add_record(record);
        }
        self
    }

    /// Capture the current contents of an index.
    pub fn from_index(index: &TableIndex) -> Self {
        Self::new(index.table()).with_records(index.array().iter().cloned())
    }

    pub fn add_record(&mut self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get_record(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidPayload(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidPayload(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fields;
    use serde_json::json;

    fn rec(id: &str, name: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        Record::new(id, fields)
    }

    #[test]
    fn json_roundtrip() {
        let snapshot = IndexSnapshot::new("users").with_records([rec("u1", "Alice")]);
        let restored = IndexSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(snapshot, restored);
        assert_eq!(restored.get_record("u1"), Some(&rec("u1", "Alice")));
    }

    #[test]
    fn deterministic_serialization() {
        let a = IndexSnapshot::new("users").with_records([rec("a", "A"), rec("b", "B")]);
        let b = IndexSnapshot::new("users").with_records([rec("b", "B"), rec("a", "A")]);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn records_serialize_flat() {
        let snapshot = IndexSnapshot::new("users").with_records([rec("u1", "Alice")]);
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "formatVersion": 1,
                "table": "users",
                "records": {"u1": {"id": "u1", "name": "Alice"}}
            })
        );
    }

    #[test]
    fn from_index_copies_everything() {
        let index = TableIndex::new("users", [rec("a", "A"), rec("b", "B")]);
        let snapshot = IndexSnapshot::from_index(&index);
        assert_eq!(snapshot.table, "users");
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{"formatVersion": 999, "table": "users", "records": {}}"#;
        let err = IndexSnapshot::from_json(json).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }
}
