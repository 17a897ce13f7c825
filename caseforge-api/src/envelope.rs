// caseforge-api/src/envelope.rs
// ============================================================================
// Module: Response Envelope
// Description: The `{success, data, meta}` / `{success, error}` JSON shape
//              every endpoint responds with.
// Purpose: Define Envelope, Meta, and the helpers handlers use to wrap a
//          successful payload at a given status code.
// Dependencies: axum, serde, serde_json
// ============================================================================

//! ## Overview
//! Every response, success or failure, is JSON with a top-level `success`
//! boolean. [`crate::error::ApiError`] builds the failure half; this module
//! builds the success half so handlers never hand-assemble the envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

/// Pagination and count metadata attached to list-shaped responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Meta {
    /// Opaque cursor to pass back in for the next page, if more remain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Total item count, when cheap to compute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

#[derive(Serialize)]
struct SuccessEnvelope<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<Meta>,
}

/// Wraps `data` in a `{success:true, data}` envelope at `status`.
pub fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(SuccessEnvelope { success: true, data, meta: None })).into_response()
}

/// Wraps `data` and `meta` in a `{success:true, data, meta}` envelope at
/// `status`.
pub fn respond_with_meta<T: Serialize>(status: StatusCode, data: T, meta: Meta) -> Response {
    (status, Json(SuccessEnvelope { success: true, data, meta: Some(meta) })).into_response()
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

    #[tokio::test]
    async fn respond_wraps_data_with_success_true_and_no_meta() {
        let response = respond(StatusCode::OK, serde_json::json!({"id": "case-1"}));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], "case-1");
        assert!(value.get("meta").is_none());
    }

    #[tokio::test]
    async fn respond_with_meta_includes_cursor_and_total() {
        let meta = Meta { cursor: Some("next".to_string()), total: Some(3) };
        let response = respond_with_meta(StatusCode::OK, serde_json::json!([1, 2, 3]), meta);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["meta"]["cursor"], "next");
        assert_eq!(value["meta"]["total"], 3);
    }
}
