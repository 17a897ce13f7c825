// caseforge-api/src/routes/upload_intent.rs
// ============================================================================
// Module: Upload Intent Routes
// Description: Handler for POST /cases/{id}/upload-intent.
// Purpose: Mint presigned PUT URLs under the case's storage-key layout.
// Dependencies: axum, caseforge-core, serde, time
// ============================================================================

//! ## Overview
//! One request may ask for several files at once; all land under the same
//! batch-id so the caller can group a multi-file upload (e.g. `front.jpg`,
//! `left.jpg`, `right.jpg`) under one directory-like prefix. `kind`
//! defaults to `scan_image`, the common case of uploading raw crime-scene
//! captures; callers uploading a different asset kind (a reference image
//! for asset-3d synthesis, say) set it explicitly.

use std::time::Duration;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use caseforge_core::AssetKind;
use caseforge_core::CaseId;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::respond;
use crate::error::ApiError;
use crate::state::SharedState;

/// How long a minted presigned PUT URL remains valid.
const UPLOAD_URL_EXPIRY: Duration = Duration::from_secs(900);

#[derive(Debug, Deserialize)]
pub struct UploadIntentRequest {
    #[serde(default)]
    kind: Option<AssetKind>,
    files: Vec<FileIntent>,
}

#[derive(Debug, Deserialize)]
struct FileIntent {
    filename: String,
    #[serde(rename = "content-type")]
    content_type: String,
    #[serde(rename = "size-bytes")]
    size_bytes: u64,
}

#[derive(Debug, Serialize)]
struct UploadTarget {
    filename: String,
    storage_key: String,
    upload_url: String,
    content_type: String,
}

#[derive(Debug, Serialize)]
struct UploadIntentResponse {
    batch_id: String,
    expires_at: OffsetDateTime,
    targets: Vec<UploadTarget>,
}

fn kind_segment(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::ScanImage => "scan_image",
        AssetKind::GeneratedImage => "generated_image",
        AssetKind::Mesh => "mesh",
        AssetKind::Pointcloud => "pointcloud",
        AssetKind::Portrait => "portrait",
        AssetKind::Report => "report",
        AssetKind::ReplayVideo => "replay_video",
        AssetKind::EvidenceModel => "evidence_model",
    }
}

pub async fn create_upload_intent(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<UploadIntentRequest>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;
    if request.files.is_empty() {
        return Err(ApiError::InvalidRequest("files must not be empty".to_string()));
    }

    let kind = request.kind.unwrap_or(AssetKind::ScanImage);
    let batch_id = caseforge_core::AssetId::generate().as_str().to_string();

    let mut targets = Vec::with_capacity(request.files.len());
    for file in request.files {
        let storage_key = format!("cases/{case_id}/{}/{batch_id}/{}", kind_segment(kind), file.filename);
        let upload_url = state.storage.generate_upload_url(&storage_key, UPLOAD_URL_EXPIRY).await?;
        targets.push(UploadTarget {
            filename: file.filename,
            storage_key,
            upload_url,
            content_type: file.content_type,
        });
        let _ = file.size_bytes;
    }

    Ok(respond(
        StatusCode::OK,
        UploadIntentResponse {
            batch_id,
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(UPLOAD_URL_EXPIRY.as_secs() as i64),
            targets,
        },
    ))
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

    use super::*;

    #[test]
    fn kind_segment_covers_every_variant() {
        assert_eq!(kind_segment(AssetKind::ScanImage), "scan_image");
        assert_eq!(kind_segment(AssetKind::EvidenceModel), "evidence_model");
    }
}
