// caseforge-api/src/error.rs
// ============================================================================
// Module: API Errors
// Description: The failure half of the response envelope and the mapping
//              from domain errors to HTTP status + error code.
// Purpose: Define ApiError, ApiErrorCode, and From impls that let handlers
//          use `?` against store/queue/client/validation errors directly.
// Dependencies: axum, caseforge-core, serde, thiserror
// ============================================================================

//! ## Overview
//! Every API error code (`INVALID_REQUEST`, `UNAUTHORIZED`, `FORBIDDEN`,
//! `NOT_FOUND`, `CONFLICT`, `RATE_LIMITED`, `JOB_FAILED`,
//! `MODEL_UNAVAILABLE`, `INTERNAL_ERROR`) is one [`ApiErrorCode`] variant.
//! Handlers construct an [`ApiError`] directly for request-shape problems,
//! or via `?` against a domain error that already carries enough
//! information to classify itself.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use caseforge_core::ClientError;
use caseforge_core::QueueError;
use caseforge_core::StoreError;
use serde::Serialize;

/// The stable error-code label returned in every failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// The request body or query parameters failed validation.
    InvalidRequest,
    /// No credentials were presented where credentials are required.
    Unauthorized,
    /// Credentials were presented but do not authorize this request.
    Forbidden,
    /// The referenced case, commit, branch, job, or asset does not exist.
    NotFound,
    /// An idempotency-key or branch-name collision, or a similar conflict.
    Conflict,
    /// The caller exceeded a configured rate limit.
    RateLimited,
    /// A referenced job has already failed terminally.
    JobFailed,
    /// An upstream AI vendor is temporarily unavailable.
    ModelUnavailable,
    /// An unclassified internal failure.
    InternalError,
}

impl ApiErrorCode {
    /// Returns the HTTP status this code maps to.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::JobFailed | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// An error surfaced to an HTTP caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request shape or query parameters were invalid.
    #[error("{0}")]
    InvalidRequest(String),
    /// The referenced resource does not exist.
    #[error("not found")]
    NotFound,
    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),
    /// The vendor rate-limited the request.
    #[error("rate limited")]
    RateLimited {
        /// Seconds to wait before retrying, if the vendor provided one.
        retry_after_secs: Option<u64>,
    },
    /// The referenced job already failed terminally.
    #[error("job failed: {0}")]
    JobFailed(String),
    /// An upstream AI vendor is temporarily unavailable.
    #[error("model unavailable")]
    ModelUnavailable,
    /// An unclassified failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> ApiErrorCode {
        match self {
            Self::InvalidRequest(_) => ApiErrorCode::InvalidRequest,
            Self::NotFound => ApiErrorCode::NotFound,
            Self::Conflict(_) => ApiErrorCode::Conflict,
            Self::RateLimited { .. } => ApiErrorCode::RateLimited,
            Self::JobFailed(_) => ApiErrorCode::JobFailed,
            Self::ModelUnavailable => ApiErrorCode::ModelUnavailable,
            Self::Internal(_) => ApiErrorCode::InternalError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RateLimited { retry_after_secs: Some(secs) } => {
                Some(serde_json::json!({ "retry_after_secs": secs }))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: ApiErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let body = ErrorBody { code, message: self.to_string(), details: self.details() };
        (code.status(), Json(ErrorEnvelope { success: false, error: body })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Corrupt(message) | StoreError::Backend(message) => Self::Internal(message),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(error: QueueError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::ModelUnavailable => Self::ModelUnavailable,
            ClientError::InvalidInput(message) => Self::InvalidRequest(message),
            ClientError::RateLimited { retry_after } => {
                Self::RateLimited { retry_after_secs: retry_after.map(|d| d.as_secs()) }
            }
            ClientError::Transient(message) | ClientError::VendorFatal(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn every_error_code_maps_to_its_expected_status() {
        assert_eq!(ApiErrorCode::InvalidRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiErrorCode::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiErrorCode::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiErrorCode::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ApiErrorCode::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiErrorCode::JobFailed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiErrorCode::ModelUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiErrorCode::InternalError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn every_error_code_serializes_screaming_snake_case() {
        let codes = [
            (ApiErrorCode::InvalidRequest, "\"INVALID_REQUEST\""),
            (ApiErrorCode::Unauthorized, "\"UNAUTHORIZED\""),
            (ApiErrorCode::Forbidden, "\"FORBIDDEN\""),
            (ApiErrorCode::NotFound, "\"NOT_FOUND\""),
            (ApiErrorCode::Conflict, "\"CONFLICT\""),
            (ApiErrorCode::RateLimited, "\"RATE_LIMITED\""),
            (ApiErrorCode::JobFailed, "\"JOB_FAILED\""),
            (ApiErrorCode::ModelUnavailable, "\"MODEL_UNAVAILABLE\""),
            (ApiErrorCode::InternalError, "\"INTERNAL_ERROR\""),
        ];
        for (code, expected) in codes {
            assert_eq!(serde_json::to_string(&code).unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn not_found_serializes_as_envelope_with_404() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn store_conflict_maps_to_conflict_code() {
        let error: ApiError = StoreError::Conflict("dup branch name".to_string()).into();
        assert_eq!(error.code(), ApiErrorCode::Conflict);
    }

    #[test]
    fn client_rate_limited_carries_retry_after_into_details() {
        let error: ApiError =
            ClientError::RateLimited { retry_after: Some(std::time::Duration::from_secs(5)) }.into();
        let details = error.details().expect("details present");
        assert_eq!(details["retry_after_secs"], 5);
    }
}
