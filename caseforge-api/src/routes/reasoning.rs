// caseforge-api/src/routes/reasoning.rs
// ============================================================================
// Module: Reasoning Routes
// Description: Handler for POST /cases/{id}/reasoning.
// Purpose: Enqueue a reasoning job; the pipeline resolves the scenegraph
//          from the store itself (snapshot or branch head), so the route
//          only forwards the optional overrides.
// Dependencies: axum, caseforge-core, caseforge-queue, serde, time
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use caseforge_core::CaseId;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use axum::response::Response;
use caseforge_core::domain::scene::Constraint;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::respond;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ReasoningRequest {
    #[serde(default)]
    branch_id: Option<String>,
    #[serde(default)]
    constraint_overrides: Option<Vec<Constraint>>,
    #[serde(default)]
    thinking_budget: Option<u32>,
    #[serde(default)]
    max_trajectories: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ReasoningResponse {
    job_id: JobId,
}

pub async fn create_reasoning_job(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<ReasoningRequest>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;

    let input = serde_json::json!({
        "branch_id": request.branch_id,
        "constraint_overrides": request.constraint_overrides,
        "thinking_budget": request.thinking_budget,
        "max_trajectories": request.max_trajectories,
    });
    let job = Job::new(JobId::generate(), case_id.clone(), JobType::Reasoning, input.clone(), None, OffsetDateTime::now_utc());
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

    Ok(respond(StatusCode::ACCEPTED, ReasoningResponse { job_id: stored.id }))
}
