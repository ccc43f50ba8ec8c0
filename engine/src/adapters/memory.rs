//! In-process adapter backed by concurrent maps. Nothing is persisted.

use super::assign_id;
use crate::{
    error::Result, Error, Fields, Query, Record, RecordId, Schema, TableInterface, TableName,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// A table's records, ordered by id so `list` sees a deterministic input order.
type Table = BTreeMap<RecordId, Record>;

/// In-memory [`TableInterface`].
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    tables: DashMap<TableName, Table>,
    schema: Option<Schema>,
}

impl MemoryAdapter {
    /// Create an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate writes against a schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Seed a table with records.
    pub fn with_records(self, table: impl Into<TableName>, records: Vec<Record>) -> Self {
        let mut entry = self.tables.entry(table.into()).or_default();
        for record in records {
            entry.insert(record.id.clone(), record);
        }
        drop(entry);
        self
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

#[async_trait]
impl TableInterface for MemoryAdapter {
    async fn find(&self, table: &str, id: &str) -> Result<Record> {
        self.tables
            .get(table)
            .and_then(|t| t.get(id).cloned())
            .ok_or_else(|| Error::not_found(table, id))
    }

    async fn create(&self, table: &str, data: Fields) -> Result<Record> {
        if let Some(schema) = &self.schema {
            schema.validate_create(table, &data)?;
        }
        let id = assign_id(&data)?;

        let mut records = self.tables.entry(table.to_string()).or_default();
        if records.contains_key(&id) {
            return Err(Error::AlreadyExists {
                table: table.to_string(),
                id,
            });
        }

        let record = Record::new(id.clone(), data);
        records.insert(id, record.clone());
        tracing::trace!(table, id = %record.id, "memory: created record");
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, data: Fields) -> Result<Record> {
        if let Some(schema) = &self.schema {
            schema.validate_patch(table, &data)?;
        }

        let mut records = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(table, id))?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::not_found(table, id))?;
        record.merge(&data);
        Ok(record.clone())
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Record> {
        let mut records = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(table, id))?;
        records
            .remove(id)
            .ok_or_else(|| Error::not_found(table, id))
    }

    async fn list(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        let snapshot: Vec<Record> = match self.tables.get(table) {
            Some(records) => records.values().cloned().collect(),
            None => Vec::new(),
        };
        Ok(query.apply(snapshot))
    }
}
