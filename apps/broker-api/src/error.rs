//! HTTP error mapping.
//!
//! ```text
//! not_found                                   → 404
//! not_authenticated (bad bearer token)        → 401
//! not_authorized                              → 403
//! conflict, illegal_transition                → 409
//! invalid_rate, invalid_amount, invalid_input,
//! invariant_violation                         → 422
//! downstream_refusal                          → 502
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_core::{CoreError, ErrorKind};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorBody {
    /// Stable kind tag, e.g. `illegal_transition`.
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Malformed path or body.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: ErrorKind::InvalidInput.as_str().to_string(),
            message: message.into(),
        }
    }

    /// Bearer token present but not verifiable.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "not_authenticated".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: message.into(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
        ErrorKind::Conflict | ErrorKind::IllegalTransition => StatusCode::CONFLICT,
        ErrorKind::InvalidRate
        | ErrorKind::InvalidAmount
        | ErrorKind::InvalidInput
        | ErrorKind::InvariantViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DownstreamRefusal => StatusCode::BAD_GATEWAY,
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let kind = error.kind();
        Self {
            status: status_for(kind),
            code: kind.as_str().to_string(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "Request failed");
        }
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::IllegalTransition), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidRate), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::DownstreamRefusal), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_core_error_keeps_kind_tag() {
        let err: ApiError = CoreError::not_found("voucher", "v-1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
    }
}
