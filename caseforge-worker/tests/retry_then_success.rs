// caseforge-worker/tests/retry_then_success.rs
// ============================================================================
// Module: Retry-Then-Success Integration Test
// Description: Drives a full Framework through a transient client failure
//              followed by a successful redelivery.
// Purpose: Exercise the retry-budget and job-state-transition invariants
//          end to end, not just the backoff arithmetic in isolation.
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

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caseforge_core::domain::commit::ModelStats;
use caseforge_core::domain::scene::SceneGraph;
use caseforge_core::interfaces::clients::ReasoningInput;
use caseforge_core::interfaces::clients::ReasoningOutput;
use caseforge_core::Case;
use caseforge_core::CaseId;
use caseforge_core::ClientError;
use caseforge_core::CommitId;
use caseforge_core::InMemoryStore;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobStatus;
use caseforge_core::JobType;
use caseforge_core::PersistenceStore;
use caseforge_core::Queue;
use caseforge_core::ReasoningClient;
use caseforge_queue::InMemoryQueue;
use caseforge_worker::framework::Framework;
use caseforge_worker::framework::RetryPolicy;
use caseforge_worker::pipelines::reasoning::ReasoningPipeline;

/// A [`ReasoningClient`] that fails its first call with a transient error
/// and succeeds on every call after.
struct FlakyReasoningClient {
    calls: AtomicU32,
}

impl FlakyReasoningClient {
    fn new() -> Self {
        Self { calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl ReasoningClient for FlakyReasoningClient {
    async fn reason(&self, _input: ReasoningInput) -> Result<ReasoningOutput, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            return Err(ClientError::Transient("simulated 503".to_string()));
        }
        Ok(ReasoningOutput {
            trajectories: Vec::new(),
            uncertainty_areas: Vec::new(),
            next_steps: Vec::new(),
            thinking_summary: "recovered after one retry".to_string(),
            model_stats: ModelStats { model_used: "flaky-v1".to_string(), elapsed_ms: 10, thinking_tokens_used: None },
        })
    }
}

#[tokio::test]
async fn transient_failure_is_retried_then_succeeds() {
    let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new([JobType::Reasoning.topic()]));

    let case_id = CaseId::new("case-retry");
    let case = Case::new(case_id.clone(), "Retry Case", None, time::OffsetDateTime::now_utc()).expect("valid case");
    store.create_case(case).await.expect("case created");
    store.upsert_scene_snapshot(&case_id, &CommitId::new("seed"), SceneGraph::empty()).await.expect("snapshot seeded");

    let job_id = JobId::new("job-retry-1");
    let job = Job::new(job_id.clone(), case_id.clone(), JobType::Reasoning, serde_json::json!({}), None, time::OffsetDateTime::now_utc());
    store.create_job(job).await.expect("job created");
    queue
        .enqueue(JobMessage { job_id: job_id.clone(), case_id: case_id.clone(), job_type: JobType::Reasoning, input: serde_json::json!({}), attempts: 1 })
        .await
        .expect("job enqueued");

    let retry_policy = RetryPolicy { max_attempts: 3, initial_interval: Duration::from_millis(5), max_interval: Duration::from_millis(20), multiplier: 2.0 };
    let mut framework = Framework::new(Arc::clone(&store), Arc::clone(&queue)).with_retry_policy(retry_policy);
    framework.register(Arc::new(ReasoningPipeline::new(Arc::new(FlakyReasoningClient::new()))));
    let handle = Arc::new(framework).start();

    let mut job_after = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = store.get_job(&job_id).await.expect("job lookup succeeds").expect("job exists");
        if job.status == JobStatus::Done {
            job_after = Some(job);
            break;
        }
    }
    handle.stop().await;

    let job_after = job_after.expect("job reached done within the polling window");
    assert_eq!(job_after.status, JobStatus::Done);
    assert_eq!(job_after.retry_count, 1);

    let commit = store.get_commit_by_job_id(&job_id).await.expect("commit lookup succeeds");
    assert!(commit.is_some(), "exactly one reasoning_result commit should exist for the job");
}
