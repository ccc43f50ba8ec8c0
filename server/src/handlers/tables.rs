//! Table handlers - run one Table Interface call per request.
//!
//! Handlers are transport-agnostic: they take already-extracted path parts,
//! query string and body, and return the JSON the route should answer with.

use crate::error::{AppError, Result};
use serde_json::Value;
use tablesync_engine::{Fields, Query, Record, TableInterface};

fn body_fields(body: Option<Value>) -> Result<Fields> {
    match body {
        Some(Value::Object(fields)) => Ok(fields),
        None | Some(Value::Null) => Ok(Fields::new()),
        Some(other) => Err(AppError::BadRequest(format!(
            "body must be a JSON object, got {other}"
        ))),
    }
}

/// GET /{table}?{query}
pub async fn handle_list(
    interface: &dyn TableInterface,
    table: &str,
    raw_query: Option<&str>,
) -> Result<Value> {
    let query = Query::from_query_string(raw_query.unwrap_or(""))?;
    let records = interface.list(table, &query).await?;
    tracing::debug!(table, count = records.len(), "list");
    Ok(Value::Array(records.iter().map(Record::to_value).collect()))
}

/// POST /{table}
pub async fn handle_create(
    interface: &dyn TableInterface,
    table: &str,
    body: Option<Value>,
) -> Result<Value> {
    let record = interface.create(table, body_fields(body)?).await?;
    tracing::debug!(table, id = %record.id, "create");
    Ok(record.to_value())
}

/// GET /{table}/{id}
pub async fn handle_find(interface: &dyn TableInterface, table: &str, id: &str) -> Result<Value> {
    let record = interface.find(table, id).await?;
    Ok(record.to_value())
}

/// PATCH /{table}/{id}
pub async fn handle_update(
    interface: &dyn TableInterface,
    table: &str,
    id: &str,
    body: Option<Value>,
) -> Result<Value> {
    let record = interface.update(table, id, body_fields(body)?).await?;
    tracing::debug!(table, id, "update");
    Ok(record.to_value())
}

/// DELETE /{table}/{id}
pub async fn handle_remove(
    interface: &dyn TableInterface,
    table: &str,
    id: &str,
) -> Result<Value> {
    let record = interface.remove(table, id).await?;
    tracing::debug!(table, id, "remove");
    Ok(record.to_value())
}
