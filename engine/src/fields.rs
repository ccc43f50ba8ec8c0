//! Field state unit: a mutable bag of form values.
//!
//! No validation and no dirty tracking. Every change notifies subscribers
//! with the whole object.

use crate::{error::Result, Error, Fields};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Argument to [`FieldState::set_fields`].
pub enum FieldsUpdate {
    /// Replace every field.
    Replace(Fields),
    /// Compute the next fields from the previous ones.
    With(Box<dyn FnOnce(&Fields) -> Fields + Send>),
}

impl FieldsUpdate {
    pub fn with(updater: impl FnOnce(&Fields) -> Fields + Send + 'static) -> Self {
        FieldsUpdate::With(Box::new(updater))
    }
}

impl From<Fields> for FieldsUpdate {
    fn from(fields: Fields) -> Self {
        FieldsUpdate::Replace(fields)
    }
}

impl fmt::Debug for FieldsUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldsUpdate::Replace(fields) => f.debug_tuple("Replace").field(fields).finish(),
            FieldsUpdate::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Shared form values. Clones share state.
#[derive(Debug, Clone)]
pub struct FieldState {
    defaults: Arc<Fields>,
    sender: Arc<watch::Sender<Fields>>,
}

impl FieldState {
    pub fn new(defaults: Fields) -> Self {
        let (sender, _) = watch::channel(defaults.clone());
        Self {
            defaults: Arc::new(defaults),
            sender: Arc::new(sender),
        }
    }

    /// Current values.
    pub fn fields(&self) -> Fields {
        self.sender.borrow().clone()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.sender.borrow().get(name).cloned()
    }

    /// Shallow merge of one field.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        let (name, value) = (name.into(), value.into());
        self.sender.send_modify(|fields| {
            fields.insert(name, value);
        });
    }

    pub fn set_fields(&self, update: impl Into<FieldsUpdate>) {
        match update.into() {
            FieldsUpdate::Replace(next) => {
                self.sender.send_modify(|fields| *fields = next);
            }
            FieldsUpdate::With(updater) => {
                self.sender.send_modify(|fields| *fields = updater(fields));
            }
        }
    }

    /// Back to the values this state was created with.
    pub fn reset(&self) {
        let defaults = (*self.defaults).clone();
        self.sender.send_modify(|fields| *fields = defaults);
    }

    pub fn defaults(&self) -> &Fields {
        &self.defaults
    }

    /// Read the current values into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields()))
            .map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    pub fn subscribe(&self) -> watch::Receiver<Fields> {
        self.sender.subscribe()
    }
}

impl Default for FieldState {
    fn default() -> Self {
        Self::new(Fields::new())
    }
}
