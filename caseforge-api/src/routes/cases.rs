// caseforge-api/src/routes/cases.rs
// ============================================================================
// Module: Case Routes
// Description: Handlers for POST/GET /cases, GET /cases/{id},
//              GET /cases/{id}/snapshot, GET /cases/{id}/timeline.
// Purpose: Thin request/response glue over PersistenceStore's case and
//          commit-log reads.
// Dependencies: axum, caseforge-core, serde, time
// ============================================================================

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use caseforge_core::Case;
use caseforge_core::CaseId;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::envelope::Meta;
use crate::envelope::respond;
use crate::envelope::respond_with_meta;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct CaseResponse {
    id: CaseId,
    title: String,
    description: Option<String>,
    created_at: OffsetDateTime,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self { id: case.id, title: case.title, description: case.description, created_at: case.created_at }
    }
}

pub async fn create_case(
    State(state): State<SharedState>,
    axum::Json(request): axum::Json<CreateCaseRequest>,
) -> Result<Response, ApiError> {
    let case = Case::new(CaseId::generate(), request.title, request.description, OffsetDateTime::now_utc())
        .map_err(|error| ApiError::InvalidRequest(error.to_string()))?;
    state.store.create_case(case.clone()).await?;
    Ok(respond(StatusCode::CREATED, CaseResponse::from(case)))
}

pub async fn list_cases(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let cases = state.store.list_cases().await?;
    let total = cases.len();
    let data: Vec<CaseResponse> = cases.into_iter().map(CaseResponse::from).collect();
    Ok(respond_with_meta(StatusCode::OK, data, Meta { cursor: None, total: Some(total) }))
}

pub async fn get_case(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
) -> Result<Response, ApiError> {
    let case = state.store.get_case(&CaseId::new(case_id)).await?.ok_or(ApiError::NotFound)?;
    Ok(respond(StatusCode::OK, CaseResponse::from(case)))
}

pub async fn get_snapshot(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;
    let snapshot = state.store.get_scene_snapshot(&case_id).await?;
    Ok(respond(StatusCode::OK, snapshot))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    cursor: Option<String>,
    limit: Option<usize>,
}

const DEFAULT_TIMELINE_LIMIT: usize = 50;
const MAX_TIMELINE_LIMIT: usize = 200;

pub async fn get_timeline(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Response, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;
    let limit = query.limit.unwrap_or(DEFAULT_TIMELINE_LIMIT).min(MAX_TIMELINE_LIMIT);
    let page = state.store.get_commits_by_case(&case_id, limit, query.cursor.as_deref()).await?;
    Ok(respond_with_meta(
        StatusCode::OK,
        page.commits,
        Meta { cursor: page.next_cursor, total: None },
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
    fn case_response_preserves_fields() {
        let case =
            Case::new(CaseId::new("case-1"), "Tech Corp Break-in", None, OffsetDateTime::UNIX_EPOCH).unwrap();
        let response = CaseResponse::from(case);
        assert_eq!(response.id, CaseId::new("case-1"));
        assert_eq!(response.title, "Tech Corp Break-in");
    }
}
