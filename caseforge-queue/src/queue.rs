// caseforge-queue/src/queue.rs
// ============================================================================
// Module: In-Memory Queue
// Description: Per-topic FIFO queue with visibility timeout and
//              dead-lettering, backed entirely by in-process state.
// Purpose: Implement caseforge_core::interfaces::queue::Queue.
// Dependencies: async-trait, caseforge-core, tokio
// ============================================================================

//! ## Overview
//! [`InMemoryQueue`] holds one [`TopicState`] per configured topic. Enqueued
//! messages sit in a `VecDeque`; dequeuing moves the head into a lease table
//! keyed by a monotonically increasing [`LeaseId`] alongside its expiry
//! instant. Acking drops the lease; nacking (or [`InMemoryQueue::recover_stale_jobs`]
//! finding an expired lease) pushes the message back to the tail, or to the
//! dead-letter list once `max_attempts` is reached.
//!
//! Topics are fixed at construction time: a call against a topic the queue
//! was not built with returns [`QueueError::UnknownTopic`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use caseforge_core::domain::job::JobMessage;
use caseforge_core::interfaces::queue::LeaseId;
use caseforge_core::interfaces::queue::LeasedMessage;
use caseforge_core::interfaces::queue::NackOutcome;
use caseforge_core::interfaces::queue::Queue;
use caseforge_core::interfaces::queue::QueueError;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;

// ============================================================================
// SECTION: Topic State
// ============================================================================

/// A single in-flight lease: the delivered message and when its visibility
/// timeout expires.
struct InFlight {
    leased: LeasedMessage,
    expires_at: Instant,
}

/// Mutable state for one topic.
#[derive(Default)]
struct TopicState {
    queued: VecDeque<JobMessage>,
    leased: HashMap<u64, InFlight>,
    dead_letters: Vec<JobMessage>,
}

impl TopicState {
    /// True when `job_id` already sits in this topic, queued or leased.
    fn contains_job(&self, job_id: &caseforge_core::domain::identifiers::JobId) -> bool {
        self.queued.iter().any(|m| &m.job_id == job_id) || self.leased.values().any(|f| &f.leased.message.job_id == job_id)
    }
}

struct Topic {
    state: Mutex<TopicState>,
    notify: Notify,
}

impl Default for Topic {
    fn default() -> Self {
        Self { state: Mutex::new(TopicState::default()), notify: Notify::new() }
    }
}

// ============================================================================
// SECTION: InMemoryQueue
// ============================================================================

/// In-process [`Queue`] implementation sufficient to run the system without
/// an external broker.
pub struct InMemoryQueue {
    topics: HashMap<String, Topic>,
    next_lease: AtomicU64,
}

impl InMemoryQueue {
    /// Builds a queue with one empty topic per name in `topics`. Calls
    /// against any other topic name return [`QueueError::UnknownTopic`].
    #[must_use]
    pub fn new(topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { topics: topics.into_iter().map(|name| (name.into(), Topic::default())).collect(), next_lease: AtomicU64::new(1) }
    }

    /// Builds a queue pre-configured with a topic per [`caseforge_core::domain::job::JobType`].
    #[must_use]
    pub fn with_default_topics() -> Self {
        Self::new(caseforge_core::domain::job::JobType::ALL.iter().map(|t| t.topic()))
    }

    fn topic(&self, name: &str) -> Result<&Topic, QueueError> {
        self.topics.get(name).ok_or_else(|| QueueError::UnknownTopic(name.to_string()))
    }

    fn next_lease_id(&self) -> LeaseId {
        LeaseId::from_raw(self.next_lease.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, message: JobMessage) -> Result<(), QueueError> {
        let topic_name = message.job_type.topic();
        let topic = self.topic(topic_name)?;
        let mut state = topic.state.lock().await;
        if state.contains_job(&message.job_id) {
            tracing::debug!(topic = topic_name, job_id = %message.job_id, "enqueue skipped, job already present");
            return Ok(());
        }
        let job_id = message.job_id.clone();
        state.queued.push_back(message);
        drop(state);
        topic.notify.notify_one();
        tracing::debug!(topic = topic_name, job_id = %job_id, "job enqueued");
        Ok(())
    }

    async fn dequeue(&self, topic_name: &str, visibility_timeout: Duration, wait: Duration) -> Result<Option<LeasedMessage>, QueueError> {
        let topic = self.topic(topic_name)?;
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut state = topic.state.lock().await;
                if let Some(message) = state.queued.pop_front() {
                    let lease_id = self.next_lease_id();
                    let leased = LeasedMessage { lease_id, topic: topic_name.to_string(), message };
                    state.leased.insert(lease_id.get(), InFlight { leased: leased.clone(), expires_at: Instant::now() + visibility_timeout });
                    tracing::debug!(topic = topic_name, job_id = %leased.message.job_id, lease = lease_id.get(), "job leased");
                    return Ok(Some(leased));
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            // Ignore timeout errors: they mean no enqueue arrived before
            // `wait` elapsed, which the loop re-checks on its next pass.
            let _ = timeout(remaining, topic.notify.notified()).await;
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, leased: &LeasedMessage) -> Result<(), QueueError> {
        let topic = self.topic(&leased.topic)?;
        let mut state = topic.state.lock().await;
        state.leased.remove(&leased.lease_id.get());
        tracing::debug!(topic = %leased.topic, job_id = %leased.message.job_id, "lease acked");
        Ok(())
    }

    async fn nack(&self, leased: LeasedMessage, max_attempts: u32) -> Result<NackOutcome, QueueError> {
        let topic = self.topic(&leased.topic)?;
        let mut state = topic.state.lock().await;
        let Some(in_flight) = state.leased.remove(&leased.lease_id.get()) else {
            return Err(QueueError::MessageNotFound);
        };
        let mut message = in_flight.leased.message;
        message.attempts += 1;
        if message.attempts >= max_attempts {
            let job_id = message.job_id.clone();
            state.dead_letters.push(message);
            drop(state);
            tracing::warn!(topic = %leased.topic, job_id = %job_id, "job dead-lettered");
            Ok(NackOutcome::DeadLettered)
        } else {
            let job_id = message.job_id.clone();
            state.queued.push_back(message);
            drop(state);
            topic.notify.notify_one();
            tracing::debug!(topic = %leased.topic, job_id = %job_id, "job nacked, requeued");
            Ok(NackOutcome::Requeued)
        }
    }

    async fn recover_stale_jobs(&self, topic_name: &str) -> Result<usize, QueueError> {
        let topic = self.topic(topic_name)?;
        let mut state = topic.state.lock().await;
        let now = Instant::now();
        let expired: Vec<u64> = state.leased.iter().filter(|(_, f)| f.expires_at <= now).map(|(id, _)| *id).collect();
        let count = expired.len();
        for id in expired {
            if let Some(in_flight) = state.leased.remove(&id) {
                state.queued.push_back(in_flight.leased.message);
            }
        }
        drop(state);
        if count > 0 {
            topic.notify.notify_waiters();
            tracing::info!(topic = topic_name, count, "recovered stale leases");
        }
        Ok(count)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use std::time::Duration;

    use caseforge_core::domain::identifiers::CaseId;
    use caseforge_core::domain::identifiers::JobId;
    use caseforge_core::domain::job::JobMessage;
    use caseforge_core::domain::job::JobType;

    use super::*;

    fn message(job_id: &str) -> JobMessage {
        JobMessage {
            job_id: JobId::new(job_id),
            case_id: CaseId::new("case-1"),
            job_type: JobType::Reconstruction,
            input: serde_json::json!({}),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn dequeue_returns_none_when_wait_elapses_empty() {
        let queue = InMemoryQueue::with_default_topics();
        let result = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips_the_message() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        let leased = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("message available");
        assert_eq!(leased.message.job_id, JobId::new("job-1"));
        queue.ack(&leased).await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_for_a_job_already_queued() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        queue.enqueue(message("job-1")).await.unwrap();
        let first = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("first delivery");
        queue.ack(&first).await.unwrap();
        let second = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_millis(20)).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_while_a_prior_delivery_is_leased() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        let _leased = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("delivery");
        queue.enqueue(message("job-1")).await.unwrap();
        let second = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_millis(20)).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn nack_requeues_to_the_tail_below_max_attempts() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        queue.enqueue(message("job-2")).await.unwrap();
        let first = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("job-1");
        let outcome = queue.nack(first, 5).await.unwrap();
        assert_eq!(outcome, NackOutcome::Requeued);

        let next = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("job-2 first");
        assert_eq!(next.message.job_id, JobId::new("job-2"));
        queue.ack(&next).await.unwrap();

        let requeued = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("job-1 requeued");
        assert_eq!(requeued.message.job_id, JobId::new("job-1"));
        assert_eq!(requeued.message.attempts, 2);
    }

    #[tokio::test]
    async fn nack_dead_letters_once_max_attempts_is_reached() {
        let queue = InMemoryQueue::with_default_topics();
        let mut msg = message("job-1");
        msg.attempts = 3;
        queue.enqueue(msg).await.unwrap();
        let leased = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("delivery");
        let outcome = queue.nack(leased, 4).await.unwrap();
        assert_eq!(outcome, NackOutcome::DeadLettered);

        let none = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_millis(20)).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn recover_stale_jobs_requeues_expired_leases_at_the_tail() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        queue.enqueue(message("job-2")).await.unwrap();
        let _stale = queue.dequeue("reconstruction", Duration::from_millis(1), Duration::from_secs(1)).await.unwrap().expect("job-1");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let recovered = queue.recover_stale_jobs("reconstruction").await.unwrap();
        assert_eq!(recovered, 1);

        let first = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("job-2 first");
        assert_eq!(first.message.job_id, JobId::new("job-2"));
        queue.ack(&first).await.unwrap();

        let second = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("job-1 recovered");
        assert_eq!(second.message.job_id, JobId::new("job-1"));
    }

    #[tokio::test]
    async fn ack_on_an_already_acked_lease_is_a_no_op() {
        let queue = InMemoryQueue::with_default_topics();
        queue.enqueue(message("job-1")).await.unwrap();
        let leased = queue.dequeue("reconstruction", Duration::from_secs(30), Duration::from_secs(1)).await.unwrap().expect("delivery");
        queue.ack(&leased).await.unwrap();
        queue.ack(&leased).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let queue = InMemoryQueue::with_default_topics();
        let err = queue.enqueue(message("job-1")).await;
        assert!(err.is_ok());
        let err = queue.dequeue("not-a-topic", Duration::from_secs(1), Duration::from_millis(10)).await;
        assert!(matches!(err, Err(QueueError::UnknownTopic(_))));
    }
}
