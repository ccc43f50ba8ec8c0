//! HTTP route definitions.

mod health;
mod tables;

use crate::AppState;
use axum::Router;

/// Create all application routes.
///
/// Table routes live under `/{base_path}`; an empty base path mounts them at
/// the root, next to the health routes.
pub fn create_routes(base_path: &str) -> Router<AppState> {
    let routes = Router::new().merge(health::routes());
    if base_path.is_empty() {
        routes.merge(tables::routes())
    } else {
        routes.nest(&format!("/{base_path}"), tables::routes())
    }
}
