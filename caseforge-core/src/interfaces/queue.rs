// caseforge-core/src/interfaces/queue.rs
// ============================================================================
// Module: Job Queue Contract
// Description: The reliable multi-topic FIFO queue interface consumed by
//              the worker framework.
// Purpose: Define Queue, QueueError, and the lease-tracking types Dequeue
//          returns.
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! One logical topic per [`crate::domain::job::JobType`]. The only shipped
//! implementation is `caseforge-queue::InMemoryQueue`, which is
//! sufficient to run the system without an external broker.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::job::JobMessage;

/// Errors a [`Queue`] implementation may return.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No worker has registered the requested topic.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    /// The referenced message is not in the processing set (already acked,
    /// already dead-lettered, or never leased).
    #[error("message not found")]
    MessageNotFound,
    /// The backend failed for a reason opaque to the caller.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Identifies a single delivery (lease) of a message, distinct from the
/// job's own id so that a redelivered message can be acked/nacked without
/// colliding with a prior lease on the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Wraps a raw lease counter value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A message leased out by [`Queue::dequeue`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeasedMessage {
    /// Identifies this specific delivery.
    pub lease_id: LeaseId,
    /// The topic this message was dequeued from.
    pub topic: String,
    /// The underlying job message.
    pub message: JobMessage,
}

/// The outcome of a [`Queue::nack`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// The message was requeued to the tail with `attempts + 1`.
    Requeued,
    /// The message was moved to the dead-letter set; `attempts + 1` would
    /// have met or exceeded `max_attempts`.
    DeadLettered,
}

/// A reliable multi-topic FIFO queue with visibility timeout and
/// dead-lettering.
///
/// Ordering guarantee: within a topic, acked or dead-lettered messages
/// never reappear; a message whose lease expires returns at the tail, not
/// its original position. Cross-topic ordering is not guaranteed.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueues a job message to the tail of its topic. Idempotent when a
    /// message for the same job already resides in the topic (queued or
    /// leased).
    async fn enqueue(&self, message: JobMessage) -> Result<(), QueueError>;

    /// Waits up to `wait` for a message on `topic`, leasing it for
    /// `visibility_timeout`. Returns `None` if none became available within
    /// `wait`.
    async fn dequeue(
        &self,
        topic: &str,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Option<LeasedMessage>, QueueError>;

    /// Removes a leased message from the processing set. No-op if the lease
    /// is already gone (acked, expired and recovered, or dead-lettered).
    async fn ack(&self, leased: &LeasedMessage) -> Result<(), QueueError>;

    /// Requeues a leased message with `attempts + 1`, unless that would
    /// meet or exceed `max_attempts`, in which case it is dead-lettered.
    async fn nack(&self, leased: LeasedMessage, max_attempts: u32) -> Result<NackOutcome, QueueError>;

    /// Scans `topic`'s processing set for leases past their visibility
    /// timeout, requeues them as if nacked (without consulting
    /// `max_attempts` — the caller/store layer enforces the retry budget on
    /// the job row), and returns the count recovered.
    async fn recover_stale_jobs(&self, topic: &str) -> Result<usize, QueueError>;
}
