//! Every error response is `{"error": <code>, "message": <text>}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockroom_auth::{AuthzError, LoginError};
use stockroom_core::DomainError;
use stockroom_infra::blob_store::BlobStoreError;
use stockroom_infra::command_dispatcher::DispatchError;

/// Handlers return the error response itself on the `Err` side.
pub type ApiResult = Result<Response, Response>;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn validation_error(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn invalid_id(what: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("concurrent modification, try again: {msg}"),
        ),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => validation_error(msg),
        DispatchError::InvariantViolation(msg) => validation_error(msg),
        DispatchError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DispatchError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        e @ DispatchError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", e.to_string())
        }
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        e @ (DispatchError::Deserialize(_) | DispatchError::Store(_)) => {
            tracing::error!(error = %e, "command failed in storage");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    dispatch_error_to_response(DispatchError::from(err))
}

/// Failures that are neither the caller's fault nor a domain outcome.
pub fn internal_error(err: impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    match err {
        AuthzError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string()),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn login_error_to_response(err: LoginError) -> Response {
    match err {
        LoginError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
    }
}

pub fn blob_error_to_response(err: BlobStoreError) -> Response {
    match err {
        BlobStoreError::InvalidData(_) | BlobStoreError::TooLarge { .. } => validation_error(err.to_string()),
        BlobStoreError::NotFound => not_found("upload"),
        BlobStoreError::Io(_) => {
            tracing::error!(error = %err, "blob store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
        }
    }
}

/// Malformed JSON bodies are validation errors, not axum's plain-text rejections.
pub fn body<T>(body: Result<axum::Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|axum::Json(v)| v)
        .map_err(|e| validation_error(e.body_text()))
}

pub fn query<T>(query: Result<axum::extract::Query<T>, QueryRejection>) -> Result<T, Response> {
    query
        .map(|axum::extract::Query(v)| v)
        .map_err(|e| validation_error(e.body_text()))
}
