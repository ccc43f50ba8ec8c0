//! Tablesync Server - reference REST backend for tablesync clients.
//!
//! Exposes any [`TableInterface`](tablesync_engine::TableInterface) over the
//! wire mapping the engine's `HttpAdapter` speaks:
//!
//! | Call                 | Request                         | Success |
//! |----------------------|---------------------------------|---------|
//! | `find(table, id)`    | `GET {base}/{table}/{id}`       | 200     |
//! | `create(table, d)`   | `POST {base}/{table}` body `d`  | 201     |
//! | `update(table, id, d)` | `PATCH {base}/{table}/{id}` body `d` | 200 |
//! | `remove(table, id)`  | `DELETE {base}/{table}/{id}`    | 200     |
//! | `list(table, q)`     | `GET {base}/{table}?{q}`        | 200     |
//!
//! Failures answer with `{ "error", "kind" }` and 404, 409, 400 or 500.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::config::{Config, Storage};
use axum::Router;
use std::sync::Arc;
use tablesync_engine::{FileAdapter, MemoryAdapter, SharedInterface};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub interface: SharedInterface,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(interface: SharedInterface, config: Config) -> Self {
        Self {
            interface,
            config: Arc::new(config),
        }
    }

    /// State backed by the storage named in `config`.
    pub fn from_config(config: Config) -> Self {
        let interface: SharedInterface = match &config.storage {
            Storage::Memory => Arc::new(MemoryAdapter::new()),
            Storage::File(dir) => Arc::new(FileAdapter::new(dir.clone())),
        };
        Self::new(interface, config)
    }
}

/// Build the application router with tracing and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes(&state.config.base_path))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
