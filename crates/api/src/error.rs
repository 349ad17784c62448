//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cqrs::BusError;
use saga::{SagaError, SagaFailure};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// A request dispatched through the bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Saga definition or execution error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

/// Maps an error classification to a status code.
fn status_for(kind: &str) -> StatusCode {
    match kind {
        "validation" | "context" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        "transient" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_body(failure: &SagaFailure) -> serde_json::Value {
    serde_json::json!({
        "error": failure.to_string(),
        "kind": failure.kind(),
        "saga_id": failure.saga_id,
        "failed_step": failure.failed_step,
        "state": failure.state().as_str(),
        "compensation": failure.compensation,
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Bus(err) => (
                status_for(err.kind()),
                serde_json::json!({ "error": err.to_string(), "kind": err.kind() }),
            ),
            ApiError::Saga(SagaError::Failed(failure)) => {
                (status_for(failure.kind()), failure_body(failure))
            }
            ApiError::Saga(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use cqrs::HandlerError;

    use super::*;

    #[test]
    fn test_handler_taxonomy_maps_to_status_codes() {
        let cases = [
            (HandlerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (HandlerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (HandlerError::Conflict("x".into()), StatusCode::CONFLICT),
            (HandlerError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (HandlerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError::Bus(BusError::Handler(err)).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_configuration_errors_are_server_errors() {
        let response = ApiError::Bus(BusError::NoHandlerRegistered {
            request_type: "RegisterParty",
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
