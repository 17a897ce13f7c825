// caseforge-worker/tests/witness_profile_portrait_cascade.rs
// ============================================================================
// Module: Witness-Profile-Portrait Cascade Integration Test
// Description: Drives four witness-statement-derived profile jobs through
//              a live Framework and confirms the automatic portrait job
//              they trigger.
// Purpose: Exercise the cross-pipeline cascade: profile jobs merging
//          attributes one witness at a time, crossing the portrait
//          threshold, and the resulting imagegen job completing the
//          suspect profile.
// Dependencies: caseforge-core, caseforge-clients, caseforge-queue,
//               caseforge-worker, tokio
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

use caseforge_clients::MockImageGenClient;
use caseforge_clients::MockProfileClient;
use caseforge_core::interfaces::clients::WitnessStatementInput;
use caseforge_core::Case;
use caseforge_core::CaseId;
use caseforge_core::Commit;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::InMemoryStore;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::PersistenceStore;
use caseforge_core::Queue;
use caseforge_queue::InMemoryQueue;
use caseforge_worker::framework::Framework;
use caseforge_worker::pipelines::imagegen::ImagegenPipeline;
use caseforge_worker::pipelines::profile::ProfilePipeline;

/// The four witness statements from the end-to-end cascade scenario: each
/// names one keyword the mock profile client's extractor recognizes, so
/// together they clear the portrait threshold's four qualifying fields.
const STATEMENTS: &[(&str, &str, f64)] = &[
    ("witness-1", "a young man running from the scene", 0.9),
    ("witness-2", "he had an athletic build", 0.7),
    ("witness-3", "light skin and a visible scar on his arm", 0.6),
    ("witness-4", "dark hair, wearing glasses", 0.85),
];

/// Authors a `witness_statement` commit directly, the way the HTTP layer
/// does before it ever touches the worker framework, then enqueues the
/// profile job that extracts attributes from it.
async fn submit_witness_statement(
    store: &Arc<dyn PersistenceStore>,
    queue: &Arc<dyn Queue>,
    case_id: &CaseId,
    source_name: &str,
    content: &str,
    credibility: f64,
) {
    let parent_commit_id = store.get_latest_commit(case_id).await.expect("latest commit lookup succeeds").map(|c| c.id);
    let commit = Commit {
        id: CommitId::generate(),
        case_id: case_id.clone(),
        parent_commit_id,
        branch_id: None,
        payload: CommitPayload::WitnessStatement {
            source_name: source_name.to_string(),
            content: content.to_string(),
            credibility,
        },
        summary: format!("witness statement from {source_name}"),
        created_at: time::OffsetDateTime::now_utc(),
        trace_id: None,
    };
    store.create_commit(commit.clone()).await.expect("witness statement commit created");

    let job_id = JobId::generate();
    let input = serde_json::json!({
        "statement": WitnessStatementInput { source_name: source_name.to_string(), content: content.to_string(), credibility },
        "witness_commit_id": commit.id,
    });
    let job = Job::new(job_id.clone(), case_id.clone(), JobType::Profile, input.clone(), None, time::OffsetDateTime::now_utc());
    let stored = store.create_job(job).await.expect("profile job created");
    queue
        .enqueue(JobMessage { job_id: stored.id, case_id: case_id.clone(), job_type: JobType::Profile, input, attempts: 1 })
        .await
        .expect("profile job enqueued");
}

#[tokio::test]
async fn four_witness_statements_cascade_into_a_completed_portrait() {
    let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new([JobType::Profile.topic(), JobType::Imagegen.topic()]));
    let case_id = CaseId::new("case-cascade");
    let case = Case::new(case_id.clone(), "Cascade Case", None, time::OffsetDateTime::now_utc()).expect("valid case");
    store.create_case(case).await.expect("case created");

    let mut framework = Framework::new(Arc::clone(&store), Arc::clone(&queue));
    framework.register(Arc::new(ProfilePipeline::new(Arc::new(MockProfileClient::new()))));
    framework.register(Arc::new(ImagegenPipeline::new(Arc::new(MockImageGenClient::new()))));
    let handle = Arc::new(framework).start();

    for (source_name, content, credibility) in STATEMENTS {
        submit_witness_statement(&store, &queue, &case_id, source_name, content, *credibility).await;
    }

    let mut profile_after = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(profile) = store.get_suspect_profile(&case_id).await.expect("profile lookup succeeds") {
            if profile.portrait_asset_key.is_some() {
                profile_after = Some(profile);
                break;
            }
        }
    }
    handle.stop().await;

    let profile_after = profile_after.expect("the cascade should complete within the polling window");
    assert!(profile_after.attributes.meets_portrait_threshold());
    assert!(profile_after.portrait_asset_key.as_deref().is_some_and(|key| !key.is_empty()));

    let commits = store.get_commits_by_case(&case_id, usize::MAX, None).await.expect("commits list succeeds");
    let witness_commits = commits.commits.iter().filter(|c| matches!(c.payload, CommitPayload::WitnessStatement { .. })).count();
    let profile_update_commits = commits.commits.iter().filter(|c| matches!(c.payload, CommitPayload::ProfileUpdate { .. })).count();
    assert_eq!(witness_commits, STATEMENTS.len());
    assert_eq!(profile_update_commits, STATEMENTS.len());

    let jobs = store.list_jobs_by_case(&case_id).await.expect("jobs list succeeds");
    let imagegen_jobs = jobs.iter().filter(|j| j.job_type == JobType::Imagegen).count();
    assert_eq!(imagegen_jobs, 1, "the portrait threshold should fire exactly one imagegen job");
}
