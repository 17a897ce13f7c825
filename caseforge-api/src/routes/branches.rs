// caseforge-api/src/routes/branches.rs
// ============================================================================
// Module: Branch Routes
// Description: Handler for POST /cases/{id}/branches.
// Purpose: Fork a named alternative timeline from an existing commit.
// Dependencies: axum, caseforge-core, serde, time
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use caseforge_core::Branch;
use caseforge_core::BranchId;
use caseforge_core::CaseId;
use caseforge_core::CommitId;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::respond;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    name: String,
    base_commit_id: String,
}

#[derive(Debug, Serialize)]
struct BranchResponse {
    id: BranchId,
    case_id: CaseId,
    name: String,
    base_commit_id: CommitId,
    created_at: OffsetDateTime,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            case_id: branch.case_id,
            name: branch.name,
            base_commit_id: branch.base_commit_id,
            created_at: branch.created_at,
        }
    }
}

pub async fn create_branch(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<CreateBranchRequest>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;

    let base_commit_id = CommitId::new(request.base_commit_id);
    state.store.get_commit(&base_commit_id).await?.ok_or(ApiError::NotFound)?;

    let branch = Branch::new(BranchId::generate(), case_id, request.name, base_commit_id, OffsetDateTime::now_utc())
        .map_err(|error| ApiError::InvalidRequest(error.to_string()))?;
    state.store.create_branch(branch.clone()).await?;
    Ok(respond(StatusCode::CREATED, BranchResponse::from(branch)))
}
