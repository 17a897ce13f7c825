// caseforge-core/src/store/memory.rs
// ============================================================================
// Module: In-Memory Persistence Store
// Description: A Mutex-guarded, map-backed PersistenceStore implementation.
// Purpose: Provide the default store for local operation and the store
//          every pipeline/worker test in this workspace runs against.
// Dependencies: async-trait, base64, time
// ============================================================================

//! ## Overview
//! A single `Mutex`-guarded map per aggregate, with poisoned-mutex recovery
//! (`lock().unwrap_or_else(|p| p.into_inner())`) rather than propagating a
//! poison error to the caller.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use time::OffsetDateTime;

use crate::commitlog;
use crate::domain::asset::Asset;
use crate::domain::asset::AssetKind;
use crate::domain::branch::Branch;
use crate::domain::case::Case;
use crate::domain::commit::Commit;
use crate::domain::identifiers::AssetId;
use crate::domain::identifiers::BranchId;
use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::CommitId;
use crate::domain::identifiers::IdempotencyKey;
use crate::domain::identifiers::JobId;
use crate::domain::job::Job;
use crate::domain::job::JobStatus;
use crate::domain::profile::SuspectProfile;
use crate::domain::scene::SceneGraph;
use crate::domain::scene::SceneGraphDiff;
use crate::interfaces::store::CommitPage;
use crate::interfaces::store::PersistenceStore;
use crate::interfaces::store::RetryBudget;
use crate::interfaces::store::SceneSnapshot;
use crate::interfaces::store::StoreError;

#[derive(Default)]
struct Inner {
    cases: BTreeMap<CaseId, Case>,
    commits: BTreeMap<CommitId, Commit>,
    branches: BTreeMap<BranchId, Branch>,
    snapshots: BTreeMap<CaseId, SceneSnapshot>,
    profiles: BTreeMap<CaseId, SuspectProfile>,
    jobs: BTreeMap<JobId, Job>,
    idempotency_index: BTreeMap<IdempotencyKey, JobId>,
    assets: BTreeMap<AssetId, Asset>,
}

/// A `Mutex`-guarded, in-memory [`PersistenceStore`].
///
/// Intended for tests and for local operation when no database URL is
/// configured; it holds everything in process memory and is lost on
/// restart.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn encode_cursor(created_at: OffsetDateTime, id: &CommitId) -> String {
    let raw = format!("{}:{}", created_at.unix_timestamp_nanos(), id.as_str());
    base64::engine::general_purpose::STANDARD.encode(raw)
}

fn decode_cursor(cursor: &str) -> Result<(i128, String), StoreError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|e| StoreError::Corrupt(format!("invalid cursor: {e}")))?;
    let raw = String::from_utf8(raw).map_err(|e| StoreError::Corrupt(format!("invalid cursor: {e}")))?;
    let (nanos, id) = raw
        .split_once(':')
        .ok_or_else(|| StoreError::Corrupt("invalid cursor".into()))?;
    let nanos: i128 = nanos
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("invalid cursor: {e}")))?;
    Ok((nanos, id.to_string()))
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn create_case(&self, case: Case) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.cases.contains_key(&case.id) {
            return Err(StoreError::Conflict(format!("case {} already exists", case.id)));
        }
        inner.cases.insert(case.id.clone(), case);
        Ok(())
    }

    async fn get_case(&self, id: &CaseId) -> Result<Option<Case>, StoreError> {
        Ok(self.lock().cases.get(id).cloned())
    }

    async fn list_cases(&self) -> Result<Vec<Case>, StoreError> {
        let mut cases: Vec<Case> = self.lock().cases.values().cloned().collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }

    async fn create_commit(&self, commit: Commit) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.commits.contains_key(&commit.id) {
            return Err(StoreError::Conflict(format!("commit {} already exists", commit.id)));
        }
        inner.commits.insert(commit.id.clone(), commit);
        Ok(())
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError> {
        Ok(self.lock().commits.get(id).cloned())
    }

    async fn get_latest_commit(&self, case_id: &CaseId) -> Result<Option<Commit>, StoreError> {
        let inner = self.lock();
        let commits: Vec<Commit> =
            inner.commits.values().filter(|c| &c.case_id == case_id).cloned().collect();
        Ok(commitlog::main_head(&commits).cloned())
    }

    async fn get_latest_commit_on_branch(
        &self,
        case_id: &CaseId,
        branch_id: &BranchId,
    ) -> Result<Option<Commit>, StoreError> {
        let inner = self.lock();
        let commits: Vec<Commit> =
            inner.commits.values().filter(|c| &c.case_id == case_id).cloned().collect();
        Ok(commitlog::branch_head(&commits, branch_id).cloned())
    }

    async fn get_commits_by_case(
        &self,
        case_id: &CaseId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CommitPage, StoreError> {
        let inner = self.lock();
        let mut commits: Vec<Commit> =
            inner.commits.values().filter(|c| &c.case_id == case_id).cloned().collect();
        commits.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });

        let start = match cursor {
            Some(cursor) => {
                let (nanos, id) = decode_cursor(cursor)?;
                commits
                    .iter()
                    .position(|c| c.created_at.unix_timestamp_nanos() == nanos && c.id.as_str() == id)
                    .map_or(0, |pos| pos + 1)
            }
            None => 0,
        };

        let page: Vec<Commit> = commits.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < commits.len() {
            page.last().map(|c| encode_cursor(c.created_at, &c.id))
        } else {
            None
        };
        Ok(CommitPage { commits: page, next_cursor })
    }

    async fn get_commit_by_job_id(&self, job_id: &JobId) -> Result<Option<Commit>, StoreError> {
        Ok(self
            .lock()
            .commits
            .values()
            .find(|c| c.payload.job_id() == Some(job_id))
            .cloned())
    }

    async fn get_commit_diff(
        &self,
        case_id: &CaseId,
        a: &CommitId,
        b: &CommitId,
    ) -> Result<SceneGraphDiff, StoreError> {
        let graph_a = self.replay_to_commit(case_id, a).await?;
        let graph_b = self.replay_to_commit(case_id, b).await?;
        Ok(graph_a.diff_against(&graph_b))
    }

    async fn replay_to_commit(
        &self,
        case_id: &CaseId,
        commit_id: &CommitId,
    ) -> Result<SceneGraph, StoreError> {
        let inner = self.lock();
        let commits: Vec<Commit> =
            inner.commits.values().filter(|c| &c.case_id == case_id).cloned().collect();
        drop(inner);
        commitlog::replay_to_commit(&commits, commit_id)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn upsert_scene_snapshot(
        &self,
        case_id: &CaseId,
        commit_id: &CommitId,
        scenegraph: SceneGraph,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.snapshots.insert(
            case_id.clone(),
            SceneSnapshot {
                case_id: case_id.clone(),
                commit_id: commit_id.clone(),
                scenegraph,
                updated_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }

    async fn get_scene_snapshot(&self, case_id: &CaseId) -> Result<Option<SceneSnapshot>, StoreError> {
        Ok(self.lock().snapshots.get(case_id).cloned())
    }

    async fn create_branch(&self, branch: Branch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let collides = inner
            .branches
            .values()
            .any(|b| b.case_id == branch.case_id && b.name == branch.name);
        if collides {
            return Err(StoreError::Conflict(format!("branch name {} already exists", branch.name)));
        }
        inner.branches.insert(branch.id.clone(), branch);
        Ok(())
    }

    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError> {
        Ok(self.lock().branches.get(id).cloned())
    }

    async fn list_branches(&self, case_id: &CaseId) -> Result<Vec<Branch>, StoreError> {
        Ok(self
            .lock()
            .branches
            .values()
            .filter(|b| &b.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn get_suspect_profile(&self, case_id: &CaseId) -> Result<Option<SuspectProfile>, StoreError> {
        Ok(self.lock().profiles.get(case_id).cloned())
    }

    async fn upsert_suspect_profile(&self, profile: SuspectProfile) -> Result<(), StoreError> {
        self.lock().profiles.insert(profile.case_id.clone(), profile);
        Ok(())
    }

    async fn create_job(&self, job: Job) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        if let Some(key) = &job.idempotency_key {
            if let Some(existing_id) = inner.idempotency_index.get(key) {
                let existing = inner
                    .jobs
                    .get(existing_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupt("idempotency index points to missing job".into()))?;
                return Ok(existing);
            }
            inner.idempotency_index.insert(key.clone(), job.id.clone());
        }
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(id).cloned())
    }

    async fn list_jobs_by_case(&self, case_id: &CaseId) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> =
            self.lock().jobs.values().filter(|j| &j.case_id == case_id).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.status = status;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_job_progress(&self, id: &JobId, progress: u8) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.progress = progress.min(100);
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_job_output(&self, id: &JobId, output: serde_json::Value) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.output = Some(output);
        job.progress = 100;
        job.status = JobStatus::Done;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_job_error(&self, id: &JobId, error: String) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.error = Some(error);
        job.status = JobStatus::Failed;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_job_heartbeat(&self, id: &JobId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn increment_job_retry(
        &self,
        id: &JobId,
        max_attempts: u32,
    ) -> Result<RetryBudget, StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.retry_count += 1;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(if job.retry_count < max_attempts {
            RetryBudget::WithinBudget
        } else {
            RetryBudget::Exhausted
        })
    }

    async fn get_zombie_jobs(&self, timeout: Duration) -> Result<Vec<Job>, StoreError> {
        let now = OffsetDateTime::now_utc();
        let timeout = time::Duration::try_from(timeout)
            .map_err(|e| StoreError::Backend(format!("invalid timeout: {e}")))?;
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running && now - j.updated_at > timeout)
            .cloned()
            .collect())
    }

    async fn create_asset(&self, asset: Asset) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict(format!("asset {} already exists", asset.id)));
        }
        let collides_key = inner.assets.values().any(|a| a.storage_key == asset.storage_key);
        if collides_key {
            return Err(StoreError::Conflict(format!(
                "storage key {} already exists",
                asset.storage_key
            )));
        }
        inner.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    async fn get_asset(&self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.lock().assets.get(id).cloned())
    }

    async fn list_assets(
        &self,
        case_id: &CaseId,
        kind: Option<AssetKind>,
    ) -> Result<Vec<Asset>, StoreError> {
        Ok(self
            .lock()
            .assets
            .values()
            .filter(|a| &a.case_id == case_id && kind.is_none_or(|k| a.kind == k))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str) -> Case {
        Case::new(CaseId::new(id), "Test Case", None, OffsetDateTime::now_utc()).unwrap()
    }

    #[tokio::test]
    async fn create_case_rejects_duplicate_id() {
        let store = InMemoryStore::new();
        store.create_case(case("c1")).await.unwrap();
        let err = store.create_case(case("c1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_job_is_idempotent_on_key_collision() {
        let store = InMemoryStore::new();
        let key = IdempotencyKey::new("k1");
        let job1 = Job::new(
            JobId::new("job-1"),
            CaseId::new("c1"),
            crate::domain::job::JobType::Reasoning,
            serde_json::json!({}),
            Some(key.clone()),
            OffsetDateTime::now_utc(),
        );
        let job2 = Job::new(
            JobId::new("job-2"),
            CaseId::new("c1"),
            crate::domain::job::JobType::Reasoning,
            serde_json::json!({}),
            Some(key),
            OffsetDateTime::now_utc(),
        );
        let first = store.create_job(job1).await.unwrap();
        let second = store.create_job(job2).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.lock().jobs.len(), 1);
    }

    #[tokio::test]
    async fn commits_by_case_paginates_newest_first() {
        let store = InMemoryStore::new();
        for i in 0..5u8 {
            let commit = Commit {
                id: CommitId::new(format!("c{i}")),
                case_id: CaseId::new("case-1"),
                parent_commit_id: None,
                branch_id: None,
                payload: crate::domain::commit::CommitPayload::UploadScan {
                    asset_keys: vec!["k.jpg".into()],
                    tier: crate::domain::commit::EvidenceTier::GroundTruth,
                },
                summary: "upload".into(),
                created_at: OffsetDateTime::from_unix_timestamp(i64::from(i)).unwrap(),
                trace_id: None,
            };
            store.create_commit(commit).await.unwrap();
        }
        let page1 = store
            .get_commits_by_case(&CaseId::new("case-1"), 2, None)
            .await
            .unwrap();
        assert_eq!(page1.commits.len(), 2);
        assert_eq!(page1.commits[0].id, CommitId::new("c4"));
        let page2 = store
            .get_commits_by_case(&CaseId::new("case-1"), 2, page1.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(page2.commits[0].id, CommitId::new("c2"));
    }

    #[tokio::test]
    async fn increment_job_retry_reports_budget_exhaustion() {
        let store = InMemoryStore::new();
        let job = Job::new(
            JobId::new("job-1"),
            CaseId::new("c1"),
            crate::domain::job::JobType::Reasoning,
            serde_json::json!({}),
            None,
            OffsetDateTime::now_utc(),
        );
        store.create_job(job).await.unwrap();
        let id = JobId::new("job-1");
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::WithinBudget);
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::WithinBudget);
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::Exhausted);
    }
}
