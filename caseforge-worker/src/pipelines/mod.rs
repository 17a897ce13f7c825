// caseforge-worker/src/pipelines/mod.rs
// ============================================================================
// Module: Domain Pipelines
// Description: One Worker implementation per job type, each wrapping a
//              single AI-client call in the validate/progress/commit
//              skeleton shared across all of them.
// Purpose: Aggregate the eight pipeline modules and the helpers they share
//          (commit authoring, idempotency checks, input parsing).
// Dependencies: caseforge-core, crate::framework
// ============================================================================

//! ## Overview
//! Every pipeline follows the same shape: parse the job's typed input,
//! check idempotency, report progress, call exactly one AI client, author
//! at most one commit (or none, for pipelines that only produce scratch
//! assets), and set the job's output. [`author_commit`] and
//! [`job_is_done`] hold the two idempotency strategies this system uses:
//! commit-producing pipelines check `GetCommitByJobID`; asset-only
//! pipelines check the job's own terminal status.

pub mod asset3d;
pub mod export;
pub mod imagegen;
pub mod profile;
pub mod reasoning;
pub mod reconstruction;
pub mod replay;
pub mod scene_analysis;

use caseforge_core::Asset;
use caseforge_core::AssetKind;
use caseforge_core::BranchId;
use caseforge_core::Commit;
use caseforge_core::CommitPayload;
use caseforge_core::JobId;
use caseforge_core::JobStatus;
use caseforge_core::SceneGraph;
use caseforge_core::domain::identifiers::AssetId;
use caseforge_core::{CaseId, CommitId};
use time::OffsetDateTime;

use crate::framework::WorkerContext;
use crate::framework::WorkerError;

/// Parses a job's `serde_json::Value` input into its typed shape, mapping
/// any schema mismatch to a fatal error (retrying will not fix bad input).
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(input: &serde_json::Value) -> Result<T, WorkerError> {
    serde_json::from_value(input.clone()).map_err(|error| WorkerError::Fatal(format!("invalid job input: {error}")))
}

/// Serializes a job's typed output into the `serde_json::Value` the store
/// persists on the job row.
pub(crate) fn to_output(value: &impl serde::Serialize) -> Result<serde_json::Value, WorkerError> {
    serde_json::to_value(value).map_err(|error| WorkerError::Fatal(format!("failed to serialize job output: {error}")))
}

/// Returns whether a commit authored by `job_id` already exists, for
/// commit-producing pipelines to short-circuit a redelivered job.
pub(crate) async fn already_committed(ctx: &WorkerContext, job_id: &JobId) -> Result<bool, WorkerError> {
    Ok(ctx.store.get_commit_by_job_id(job_id).await?.is_some())
}

/// Returns whether `job_id` has already reached `done`, for pipelines that
/// produce only scratch assets and author no commit.
pub(crate) async fn job_is_done(ctx: &WorkerContext, job_id: &JobId) -> Result<bool, WorkerError> {
    Ok(ctx
        .store
        .get_job(job_id)
        .await?
        .is_some_and(|job| job.status == JobStatus::Done))
}

/// Builds and persists a commit with a pre-chosen id, appending it to the
/// case's main chain (or, when `branch_id` is set, to that branch's own
/// chain) and, if the payload carries a scene diff, folding it into the
/// current snapshot.
///
/// Parent resolution is branch-aware: a branch-scoped commit parents onto
/// the newest existing commit on that branch, or, if the branch has none
/// of its own yet, onto its `base_commit_id`.
pub(crate) async fn author_commit(
    ctx: &WorkerContext,
    id: CommitId,
    case_id: &CaseId,
    branch_id: Option<BranchId>,
    payload: CommitPayload,
    summary: impl Into<String>,
) -> Result<Commit, WorkerError> {
    let parent_commit_id = match &branch_id {
        Some(branch_id) => match ctx.store.get_latest_commit_on_branch(case_id, branch_id).await? {
            Some(commit) => Some(commit.id),
            None => {
                let branch = ctx
                    .store
                    .get_branch(branch_id)
                    .await?
                    .ok_or_else(|| WorkerError::Fatal(format!("branch {branch_id} not found")))?;
                Some(branch.base_commit_id)
            }
        },
        None => ctx.store.get_latest_commit(case_id).await?.map(|c| c.id),
    };
    let commit = Commit {
        id,
        case_id: case_id.clone(),
        parent_commit_id,
        branch_id,
        payload,
        summary: summary.into(),
        created_at: OffsetDateTime::now_utc(),
        trace_id: None,
    };
    ctx.store.create_commit(commit.clone()).await?;
    if let Some(diff) = commit.payload.scene_diff() {
        let mut scenegraph = ctx
            .store
            .get_scene_snapshot(case_id)
            .await?
            .map_or_else(SceneGraph::empty, |snapshot| snapshot.scenegraph);
        scenegraph.apply_diff(diff);
        ctx.store.upsert_scene_snapshot(case_id, &commit.id, scenegraph).await?;
    }
    Ok(commit)
}

/// Persists a generated or synthesized binary artifact.
pub(crate) async fn create_asset(
    ctx: &WorkerContext,
    case_id: &CaseId,
    kind: AssetKind,
    storage_key: String,
    metadata: serde_json::Value,
) -> Result<Asset, WorkerError> {
    let asset = Asset {
        id: AssetId::generate(),
        case_id: case_id.clone(),
        kind,
        storage_key,
        metadata,
        created_at: OffsetDateTime::now_utc(),
    };
    ctx.store.create_asset(asset.clone()).await?;
    Ok(asset)
}
