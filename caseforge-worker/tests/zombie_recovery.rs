// caseforge-worker/tests/zombie_recovery.rs
// ============================================================================
// Module: Zombie Recovery Integration Test
// Description: Drives the Framework's zombie sweeper against jobs stuck in
//              `running` with a stale heartbeat and no worker left to
//              finish them.
// Purpose: Exercise the visibility-recovery and retry-budget invariants for
//          jobs whose worker crashed without acking or nacking.
// Dependencies: caseforge-core, caseforge-queue, caseforge-worker, tokio
// ============================================================================

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caseforge_core::domain::commit::ModelStats;
use caseforge_core::interfaces::clients::ReasoningInput;
use caseforge_core::interfaces::clients::ReasoningOutput;
use caseforge_core::Case;
use caseforge_core::CaseId;
use caseforge_core::ClientError;
use caseforge_core::InMemoryStore;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobStatus;
use caseforge_core::JobType;
use caseforge_core::PersistenceStore;
use caseforge_core::Queue;
use caseforge_core::ReasoningClient;
use caseforge_queue::InMemoryQueue;
use caseforge_worker::framework::Framework;
use caseforge_worker::framework::RetryPolicy;
use caseforge_worker::pipelines::reasoning::ReasoningPipeline;

/// Succeeds immediately; stands in for the worker instance that redelivery
/// lands on once the zombie sweeper requeues a stuck job.
struct InstantReasoningClient;

#[async_trait]
impl ReasoningClient for InstantReasoningClient {
    async fn reason(&self, _input: ReasoningInput) -> Result<ReasoningOutput, ClientError> {
        Ok(ReasoningOutput {
            trajectories: Vec::new(),
            uncertainty_areas: Vec::new(),
            next_steps: Vec::new(),
            thinking_summary: "recovered after zombie sweep".to_string(),
            model_stats: ModelStats { model_used: "instant-v1".to_string(), elapsed_ms: 1, thinking_tokens_used: None },
        })
    }
}

async fn seed_case(store: &Arc<dyn PersistenceStore>, case_id: &CaseId) {
    let case = Case::new(case_id.clone(), "Zombie Case", None, time::OffsetDateTime::now_utc()).expect("valid case");
    store.create_case(case).await.expect("case created");
}

/// A job left in `running` with no corresponding queue lease models a
/// worker that updated the job's status, then crashed before it ever
/// acked, nacked, or sent a heartbeat: `updated-at` is frozen at the
/// moment it started running.
async fn seed_running_job(store: &Arc<dyn PersistenceStore>, job_id: &JobId, case_id: &CaseId, retry_count: u32) {
    let mut job = Job::new(job_id.clone(), case_id.clone(), JobType::Reasoning, serde_json::json!({}), None, time::OffsetDateTime::now_utc());
    job.status = JobStatus::Running;
    job.retry_count = retry_count;
    store.create_job(job).await.expect("job created");
}

#[tokio::test]
async fn a_job_stuck_running_is_requeued_and_completes_on_redelivery() {
    let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new([JobType::Reasoning.topic()]));
    let case_id = CaseId::new("case-zombie-1");
    seed_case(&store, &case_id).await;

    let job_id = JobId::new("job-zombie-1");
    seed_running_job(&store, &job_id, &case_id, 0).await;

    let retry_policy = RetryPolicy { max_attempts: 3, initial_interval: Duration::from_millis(5), max_interval: Duration::from_millis(20), multiplier: 2.0 };
    let mut framework = Framework::new(Arc::clone(&store), Arc::clone(&queue))
        .with_retry_policy(retry_policy)
        .with_zombie_timeout(Duration::from_millis(40));
    framework.register(Arc::new(ReasoningPipeline::new(Arc::new(InstantReasoningClient))));
    let handle = Arc::new(framework).start();

    let mut job_after = None;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = store.get_job(&job_id).await.expect("job lookup succeeds").expect("job exists");
        if job.status == JobStatus::Done {
            job_after = Some(job);
            break;
        }
    }
    handle.stop().await;

    let job_after = job_after.expect("job should reach done once the zombie sweep requeues it for redelivery");
    assert_eq!(job_after.status, JobStatus::Done);
    assert_eq!(job_after.retry_count, 1, "attempts count should reflect the single zombie-triggered retry");

    let commit = store.get_commit_by_job_id(&job_id).await.expect("commit lookup succeeds");
    assert!(commit.is_some(), "the recovered delivery should still author its reasoning_result commit");
}

#[tokio::test]
async fn a_zombie_job_past_its_retry_budget_fails_with_the_expected_reason() {
    let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new([JobType::Reasoning.topic()]));
    let case_id = CaseId::new("case-zombie-2");
    seed_case(&store, &case_id).await;

    let job_id = JobId::new("job-zombie-2");
    // Already at max_attempts - 1 retries; the next zombie sweep exhausts
    // the budget instead of requeuing.
    seed_running_job(&store, &job_id, &case_id, 2).await;

    let retry_policy = RetryPolicy { max_attempts: 3, initial_interval: Duration::from_millis(5), max_interval: Duration::from_millis(20), multiplier: 2.0 };
    let framework = Framework::new(Arc::clone(&store), Arc::clone(&queue))
        .with_retry_policy(retry_policy)
        .with_zombie_timeout(Duration::from_millis(20));
    let handle = Arc::new(framework).start();

    let mut job_after = None;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = store.get_job(&job_id).await.expect("job lookup succeeds").expect("job exists");
        if job.error.is_some() {
            job_after = Some(job);
            break;
        }
    }
    handle.stop().await;

    let job_after = job_after.expect("zombie sweep should mark the exhausted job failed within the polling window");
    assert_eq!(job_after.error.as_deref(), Some("zombie-exceeded-retries"));
}
