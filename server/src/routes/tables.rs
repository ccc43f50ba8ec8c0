//! Table endpoint routes.

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::error::Result;
use crate::handlers::{handle_create, handle_find, handle_list, handle_remove, handle_update};
use crate::AppState;

/// Create table routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{table}", get(list_handler).post(create_handler))
        .route(
            "/{table}/{id}",
            get(find_handler).patch(update_handler).delete(remove_handler),
        )
}

/// An absent body is an empty patch; a malformed one is a 400.
fn optional_body(
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Option<Value>> {
    match payload {
        Ok(Json(body)) => Ok(Some(body)),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(None),
        Err(rejection) => Err(rejection.into()),
    }
}

/// GET /{table} - List records matching the query string.
async fn list_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>> {
    let records = handle_list(state.interface.as_ref(), &table, query.as_deref()).await?;
    Ok(Json(records))
}

/// POST /{table} - Create a record.
async fn create_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let body = optional_body(payload)?;
    let record = handle_create(state.interface.as_ref(), &table, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /{table}/{id} - Fetch one record.
async fn find_handler(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let record = handle_find(state.interface.as_ref(), &table, &id).await?;
    Ok(Json(record))
}

/// PATCH /{table}/{id} - Merge fields into a record.
async fn update_handler(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let body = optional_body(payload)?;
    let record = handle_update(state.interface.as_ref(), &table, &id, body).await?;
    Ok(Json(record))
}

/// DELETE /{table}/{id} - Remove a record and return what was removed.
async fn remove_handler(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let record = handle_remove(state.interface.as_ref(), &table, &id).await?;
    Ok(Json(record))
}
