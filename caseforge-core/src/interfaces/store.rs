// caseforge-core/src/interfaces/store.rs
// ============================================================================
// Module: Persistence Store Contract
// Description: The durable-storage interface consumed by pipelines and the
//              HTTP layer.
// Purpose: Define PersistenceStore, StoreError, and the small value types
//          its contract returns (SceneSnapshot, CommitPage).
// Dependencies: async-trait, serde, thiserror, time
// ============================================================================

//! ## Overview
//! [`PersistenceStore`] is the single trait every durable backend
//! implements: the in-memory store in [`crate::store::memory`] for tests
//! and default local operation, and `caseforge-store-sqlite` for durable
//! deployments. Nothing above this trait should know which backend is
//! wired in.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::asset::Asset;
use crate::domain::asset::AssetKind;
use crate::domain::branch::Branch;
use crate::domain::case::Case;
use crate::domain::commit::Commit;
use crate::domain::identifiers::AssetId;
use crate::domain::identifiers::BranchId;
use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::CommitId;
use crate::domain::identifiers::JobId;
use crate::domain::job::Job;
use crate::domain::job::JobStatus;
use crate::domain::profile::SuspectProfile;
use crate::domain::scene::SceneGraph;
use crate::domain::scene::SceneGraphDiff;

/// Errors a [`PersistenceStore`] implementation may return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,
    /// A uniqueness constraint was violated (duplicate id, branch name, or
    /// idempotency key).
    #[error("conflict: {0}")]
    Conflict(String),
    /// A stored row could not be decoded; the data is corrupt or from an
    /// incompatible schema version.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// The backend failed for a reason opaque to the caller (I/O, driver
    /// error, connection loss).
    #[error("backend error: {0}")]
    Backend(String),
}

/// The materialized current SceneGraph for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// The case this snapshot belongs to.
    pub case_id: CaseId,
    /// The commit that produced this state.
    pub commit_id: CommitId,
    /// The materialized world state.
    pub scenegraph: SceneGraph,
    /// Last-modified timestamp.
    pub updated_at: OffsetDateTime,
}

/// A page of commits returned by [`PersistenceStore::get_commits_by_case`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitPage {
    /// Commits in the page, newest first.
    pub commits: Vec<Commit>,
    /// Opaque cursor to pass back in for the next page, if more remain.
    pub next_cursor: Option<String>,
}

/// The result of [`PersistenceStore::increment_job_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// The job has attempts remaining and should be requeued.
    WithinBudget,
    /// The job has exhausted its retry budget and should be failed.
    Exhausted,
}

/// A transactional, row-oriented durable store for every aggregate in the
/// domain model.
///
/// Implementations MUST enforce: uniqueness of `(case_id, branch.name)`;
/// uniqueness of `jobs.idempotency_key` when set; commit immutability after
/// `create_commit` returns `Ok`.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Persists a new case.
    async fn create_case(&self, case: Case) -> Result<(), StoreError>;
    /// Fetches a case by id.
    async fn get_case(&self, id: &CaseId) -> Result<Option<Case>, StoreError>;
    /// Lists all cases, newest first.
    async fn list_cases(&self) -> Result<Vec<Case>, StoreError>;

    /// Persists a new commit. Fails with [`StoreError::Conflict`] if `id`
    /// collides with an existing commit.
    async fn create_commit(&self, commit: Commit) -> Result<(), StoreError>;
    /// Fetches a commit by id.
    async fn get_commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError>;
    /// Returns the newest commit on the case's main branch, if any.
    async fn get_latest_commit(&self, case_id: &CaseId) -> Result<Option<Commit>, StoreError>;
    /// Returns the newest commit attached to `branch_id`, or `None` if the
    /// branch has no commits of its own yet.
    async fn get_latest_commit_on_branch(
        &self,
        case_id: &CaseId,
        branch_id: &BranchId,
    ) -> Result<Option<Commit>, StoreError>;
    /// Returns commits for a case, newest first, paginated by an opaque
    /// cursor encoding `(created_at, id)`.
    async fn get_commits_by_case(
        &self,
        case_id: &CaseId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CommitPage, StoreError>;
    /// Finds the commit authored by a given job, for worker-side
    /// idempotency.
    async fn get_commit_by_job_id(&self, job_id: &JobId) -> Result<Option<Commit>, StoreError>;
    /// Returns the scene-graph diff between the snapshots materialized at
    /// two commits on the same case.
    async fn get_commit_diff(
        &self,
        case_id: &CaseId,
        a: &CommitId,
        b: &CommitId,
    ) -> Result<SceneGraphDiff, StoreError>;
    /// Reconstructs a SceneGraph by folding commit payloads from the case
    /// root along the parent chain up to `commit_id`. Pure and
    /// deterministic: two calls with the same arguments return byte-equal
    /// graphs.
    async fn replay_to_commit(
        &self,
        case_id: &CaseId,
        commit_id: &CommitId,
    ) -> Result<SceneGraph, StoreError>;

    /// Upserts the case's scene snapshot. Last-write-wins keyed by the
    /// commit's position in the timeline.
    async fn upsert_scene_snapshot(
        &self,
        case_id: &CaseId,
        commit_id: &CommitId,
        scenegraph: SceneGraph,
    ) -> Result<(), StoreError>;
    /// Returns the case's current scene snapshot, if any commits exist.
    async fn get_scene_snapshot(&self, case_id: &CaseId) -> Result<Option<SceneSnapshot>, StoreError>;

    /// Persists a new branch. Fails with [`StoreError::Conflict`] if
    /// `(case_id, name)` collides with an existing branch.
    async fn create_branch(&self, branch: Branch) -> Result<(), StoreError>;
    /// Fetches a branch by id.
    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError>;
    /// Lists branches for a case.
    async fn list_branches(&self, case_id: &CaseId) -> Result<Vec<Branch>, StoreError>;

    /// Returns the case's suspect profile, if any witness statements have
    /// been processed.
    async fn get_suspect_profile(&self, case_id: &CaseId) -> Result<Option<SuspectProfile>, StoreError>;
    /// Upserts the case's suspect profile.
    async fn upsert_suspect_profile(&self, profile: SuspectProfile) -> Result<(), StoreError>;

    /// Persists a new job, or returns the existing job if
    /// `idempotency_key` collides with one already stored.
    async fn create_job(&self, job: Job) -> Result<Job, StoreError>;
    /// Fetches a job by id.
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;
    /// Lists jobs for a case, newest first.
    async fn list_jobs_by_case(&self, case_id: &CaseId) -> Result<Vec<Job>, StoreError>;
    /// Transitions a job's status.
    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> Result<(), StoreError>;
    /// Updates a job's progress, in `[0, 100]`.
    async fn update_job_progress(&self, id: &JobId, progress: u8) -> Result<(), StoreError>;
    /// Sets a job's output and marks it done with `progress == 100`.
    async fn update_job_output(&self, id: &JobId, output: serde_json::Value) -> Result<(), StoreError>;
    /// Sets a job's error and marks it failed.
    async fn update_job_error(&self, id: &JobId, error: String) -> Result<(), StoreError>;
    /// Refreshes a running job's heartbeat (`updated_at`).
    async fn update_job_heartbeat(&self, id: &JobId) -> Result<(), StoreError>;
    /// Atomically increments a job's retry count and reports whether it
    /// remains within `max_attempts`.
    async fn increment_job_retry(
        &self,
        id: &JobId,
        max_attempts: u32,
    ) -> Result<RetryBudget, StoreError>;
    /// Returns jobs with `status == running` whose heartbeat is older than
    /// `timeout`.
    async fn get_zombie_jobs(&self, timeout: Duration) -> Result<Vec<Job>, StoreError>;

    /// Persists a new asset.
    async fn create_asset(&self, asset: Asset) -> Result<(), StoreError>;
    /// Fetches an asset by id.
    async fn get_asset(&self, id: &AssetId) -> Result<Option<Asset>, StoreError>;
    /// Lists assets for a case, optionally filtered by kind.
    async fn list_assets(
        &self,
        case_id: &CaseId,
        kind: Option<AssetKind>,
    ) -> Result<Vec<Asset>, StoreError>;
}
