use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use stockbook_auth::AuthError;
use stockbook_core::{AggregateId, DomainError};
use stockbook_infra::command_dispatcher::DispatchError;

use crate::app::services::RegistrationError;

/// Every failure a handler can return. Rendered as `{"error", "message"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("{0}")]
    BadBody(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::BadBody(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Dispatch(e) => dispatch_error_to_response(e),
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Auth(e) => auth_error_to_response(e),
            ApiError::Registration(RegistrationError::Invalid(e)) => domain_error_to_response(e),
            ApiError::Registration(RegistrationError::Auth(e)) => auth_error_to_response(e),
            ApiError::Registration(e @ RegistrationError::EmailTaken) => {
                json_error(StatusCode::CONFLICT, "conflict", e.to_string())
            }
            ApiError::Registration(e @ RegistrationError::Unavailable) => {
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
            }
            ApiError::BadBody(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_body", msg),
            ApiError::NotFound(what) => {
                json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn auth_error_to_response(err: AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials | AuthError::InvalidToken(_) | AuthError::Claims(_) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
        }
        AuthError::Hashing(_) | AuthError::Encoding(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
        }
    }
}

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

/// Name the missing entity when a lookup through the dispatcher comes back empty.
pub fn missing(what: &'static str) -> impl Fn(DispatchError) -> ApiError {
    move |err| match err {
        DispatchError::NotFound => ApiError::NotFound(what),
        other => ApiError::Dispatch(other),
    }
}

/// Parse a path segment into an aggregate id (400 on failure).
pub fn parse_id(raw: &str) -> Result<AggregateId, ApiError> {
    Ok(raw.parse::<AggregateId>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::from(DomainError::validation("x")), StatusCode::BAD_REQUEST),
            (ApiError::from(DomainError::invalid_input("x")), StatusCode::BAD_REQUEST),
            (ApiError::from(DomainError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::from(DispatchError::Conflict("x".into())), StatusCode::CONFLICT),
            (
                ApiError::from(DispatchError::InvariantViolation("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(DispatchError::Publish("x".into())), StatusCode::BAD_GATEWAY),
            (ApiError::NotFound("product"), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
