//! Unified error handling for the server.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tablesync_engine::adapters::http::{error_body, error_status};

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] tablesync_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Engine(e) => {
                let status = StatusCode::from_u16(error_status(e))
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!("Engine error: {:?}", e);
                } else {
                    tracing::debug!("Engine error: {}", e);
                }
                (status, error_body(e))
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({"error": msg, "kind": "validation"}),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_engine::Error;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (Error::not_found("todos", "x"), StatusCode::NOT_FOUND),
            (
                Error::AlreadyExists {
                    table: "todos".into(),
                    id: "x".into(),
                },
                StatusCode::CONFLICT,
            ),
            (Error::InvalidPayload("bad".into()), StatusCode::BAD_REQUEST),
            (Error::Transport("down".into()), StatusCode::BAD_GATEWAY),
            (Error::Misuse("oops".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn bad_request_is_400() {
        let response = AppError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
