//! Ready-made CRUD forms: field state plus one action each.

use crate::action::{Action, ActionConfig};
use crate::error::Result;
use crate::{FieldState, Fields, Query, Record, RecordId, TableSync, UpdateParams};
use serde_json::Value;

/// Collects values and submits them as a `create`. Fields reset on success.
#[derive(Debug, Clone)]
pub struct CreateForm {
    fields: FieldState,
    action: Action<Fields, Record>,
}

impl CreateForm {
    pub fn new(sync: &TableSync, defaults: Fields) -> Self {
        let fields = FieldState::new(defaults);
        let reset = fields.clone();
        let action = sync.create_with(ActionConfig::new().on_success(move |_| reset.reset()));
        Self { fields, action }
    }

    pub fn fields(&self) -> &FieldState {
        &self.fields
    }

    pub fn action(&self) -> &Action<Fields, Record> {
        &self.action
    }

    pub async fn submit(&self) -> Result<Record> {
        self.action.trigger(self.fields.fields()).await
    }
}

/// Edits one record and submits only what changed.
#[derive(Debug)]
pub struct UpdateForm {
    id: RecordId,
    sync: TableSync,
    baseline: Fields,
    fields: FieldState,
    action: Action<UpdateParams, Record>,
}

impl UpdateForm {
    /// Fields start from the record's cached value, or empty if not cached.
    pub fn new(sync: &TableSync, id: impl Into<RecordId>) -> Self {
        let id = id.into();
        let baseline = sync.get(&id).map(|r| r.fields).unwrap_or_default();
        Self {
            fields: FieldState::new(baseline.clone()),
            action: sync.update_with(ActionConfig::new()),
            sync: sync.clone(),
            baseline,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &FieldState {
        &self.fields
    }

    pub fn action(&self) -> &Action<UpdateParams, Record> {
        &self.action
    }

    /// Fields whose value differs from the baseline.
    pub fn patch(&self) -> Fields {
        self.fields
            .fields()
            .into_iter()
            .filter(|(name, value)| self.baseline.get(name) != Some(value))
            .collect()
    }

    /// Re-read the baseline from the index, discarding edits.
    pub fn reload(&mut self) {
        self.baseline = self.sync.get(&self.id).map(|r| r.fields).unwrap_or_default();
        self.fields.set_fields(self.baseline.clone());
    }

    pub async fn submit(&mut self) -> Result<Record> {
        let params = UpdateParams::new(self.id.clone(), self.patch());
        let record = self.action.trigger(params).await?;
        self.baseline = record.fields.clone();
        self.fields.set_fields(record.fields.clone());
        Ok(record)
    }
}

/// Turns field values into equality filters and runs `list`.
#[derive(Debug, Clone)]
pub struct FilterForm {
    base: Query,
    fields: FieldState,
    action: Action<Query, Vec<Record>>,
}

impl FilterForm {
    pub fn new(sync: &TableSync, base: Query, defaults: Fields) -> Self {
        Self {
            base,
            fields: FieldState::new(defaults),
            action: sync.list_with(ActionConfig::new()),
        }
    }

    pub fn fields(&self) -> &FieldState {
        &self.fields
    }

    pub fn action(&self) -> &Action<Query, Vec<Record>> {
        &self.action
    }

    /// The base query plus one equality filter per non-empty field.
    pub fn query(&self) -> Query {
        self.fields
            .fields()
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Null) && value != "")
            .fold(self.base.clone(), |query, (name, value)| query.eq(name, value))
    }

    pub async fn submit(&self) -> Result<Vec<Record>> {
        self.action.trigger(self.query()).await
    }
}
