//! JSON error bodies for the REST gateway: `{ "error": ..., "details": [...] }`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            Error::InvalidInput { message, details } => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    error: message,
                    details: Some(details),
                },
            },
            Error::Conflict(message) => Self::new(StatusCode::CONFLICT, message),
            Error::Persistence(detail) => {
                tracing::error!("Persistence failure: {}", detail);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save configuration.")
            }
            Error::UpstreamUnavailable(detail) => {
                tracing::warn!("Upstream unavailable: {}", detail);
                Self::new(StatusCode::BAD_GATEWAY, "Upstream service unavailable.")
            }
            other => {
                tracing::error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_errors_hide_details() {
        let api: ApiError = Error::Persistence("/home/me/.mission-deck/secrets.json: EACCES".into()).into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.body.error.contains("secrets"));
    }

    #[test]
    fn validation_errors_carry_details() {
        let api: ApiError = Error::invalid_all(vec!["a".into(), "b".into()]).into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.body.error, "a");
        assert_eq!(api.body.details.as_deref().map(<[String]>::len), Some(2));
    }
}
