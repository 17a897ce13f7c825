// caseforge-api/src/routes/witness_statements.rs
// ============================================================================
// Module: Witness Statement Routes
// Description: Handler for POST /cases/{id}/witness-statements.
// Purpose: Author a witness_statement commit directly (it is user-authored,
//          not worker-authored) and auto-enqueue the profile job that
//          extracts attributes from it.
// Dependencies: axum, caseforge-core, caseforge-queue, serde, time
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use caseforge_core::CaseId;
use caseforge_core::Commit;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::respond;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct WitnessStatementRequest {
    source_name: String,
    content: String,
    credibility: f64,
}

#[derive(Debug, Serialize)]
struct WitnessStatementResponse {
    commit_id: CommitId,
    profile_job_id: JobId,
}

pub async fn create_witness_statement(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<WitnessStatementRequest>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;

    let parent_commit_id = state.store.get_latest_commit(&case_id).await?.map(|commit| commit.id);
    let now = OffsetDateTime::now_utc();
    let commit = Commit {
        id: CommitId::generate(),
        case_id: case_id.clone(),
        parent_commit_id,
        branch_id: None,
        payload: CommitPayload::WitnessStatement {
            source_name: request.source_name.clone(),
            content: request.content.clone(),
            credibility: request.credibility,
        },
        summary: format!("witness statement from {}", request.source_name),
        created_at: now,
        trace_id: None,
    };
    state.store.create_commit(commit.clone()).await?;
    state.changefeed.publish_commit(commit.clone());

    let profile_job_id = JobId::generate();
    let input = serde_json::json!({
        "statement": {
            "source_name": request.source_name,
            "content": request.content,
            "credibility": request.credibility,
        },
        "witness_commit_id": commit.id,
    });
    let job = Job::new(profile_job_id.clone(), case_id.clone(), JobType::Profile, input.clone(), None, now);
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

    Ok(respond(
        StatusCode::ACCEPTED,
        WitnessStatementResponse { commit_id: commit.id, profile_job_id: stored.id },
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
    fn request_deserializes_from_snake_case_json() {
        let request: WitnessStatementRequest = serde_json::from_value(serde_json::json!({
            "source_name": "neighbor",
            "content": "heard a crash around midnight",
            "credibility": 0.6,
        }))
        .unwrap();
        assert_eq!(request.source_name, "neighbor");
    }
}
