// caseforge-api/src/routes/export.rs
// ============================================================================
// Module: Export Routes
// Description: Handler for POST /cases/{id}/export.
// Purpose: Enqueue an export job that renders the case (or a branch) into
//          a report asset.
// Dependencies: axum, caseforge-core, caseforge-queue, serde, time
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use caseforge_core::CaseId;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::domain::commit::ExportFormat;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::respond;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    format: ExportFormat,
    #[serde(default)]
    branch_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportResponse {
    job_id: JobId,
}

pub async fn create_export_job(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<ExportRequest>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;

    let input = serde_json::json!({
        "format": request.format,
        "branch_id": request.branch_id,
    });
    let job = Job::new(JobId::generate(), case_id.clone(), JobType::Export, input.clone(), None, OffsetDateTime::now_utc());
    let stored = state.store.create_job(job).await?;
    state
        .queue
        .enqueue(JobMessage {
            job_id: stored.id.clone(),
            case_id: stored.case_id.clone(),
            job_type: stored.job_type,
            input,
            attempts: 1,
        })
        .await?;

    Ok(respond(StatusCode::ACCEPTED, ExportResponse { job_id: stored.id }))
}
