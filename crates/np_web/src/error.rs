use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{error, warn};

use np_core::Error;

/// JSON error body: `{detail, error_type, status_code, timestamp}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ValidationError", detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AuthenticationError", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", detail)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match &e {
            Error::Validation(_) => Self::bad_request(e.to_string()),
            Error::InvalidUrl(_) => Self::new(StatusCode::BAD_REQUEST, "InvalidUrl", e.to_string()),
            Error::UnsupportedSource(_) => Self::new(StatusCode::BAD_REQUEST, "UnsupportedSource", e.to_string()),
            Error::Fetch { .. } | Error::Http(_) => Self::new(StatusCode::BAD_GATEWAY, "ExternalServiceError", e.to_string()),
            Error::Scraping(_) => Self::new(StatusCode::BAD_GATEWAY, "ParsingError", e.to_string()),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", e.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), detail = %self.detail, "request failed");
        } else {
            warn!(status = self.status.as_u16(), detail = %self.detail, "request rejected");
        }
        let body = json!({
            "detail": self.detail,
            "error_type": self.error_type,
            "status_code": self.status.as_u16(),
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        (self.status, Json(body)).into_response()
    }
}
