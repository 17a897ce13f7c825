// caseforge-worker/src/telemetry.rs
// ============================================================================
// Module: Worker Telemetry
// Description: Typed lifecycle events emitted by the job-processing
//              framework, independent of the `tracing` log lines.
// Purpose: Define JobEvent/JobOutcome and a TelemetrySink trait so tests
//          and future metrics backends can observe job outcomes without
//          scraping logs.
// Dependencies: caseforge-core, tracing
// ============================================================================

//! ## Overview
//! Typed lifecycle events rather than leaving observability to log lines
//! alone: a [`TelemetrySink`] receives one [`JobEvent`] per state
//! transition, and the default sink re-emits them as structured `tracing`
//! events.

use caseforge_core::JobId;

/// A single lifecycle event emitted by the framework while processing a job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A message was dequeued and handed to a worker.
    Dequeued {
        /// The job being processed.
        job_id: JobId,
        /// The topic it was dequeued from.
        topic: String,
        /// The delivery attempt number.
        attempt: u32,
    },
    /// A heartbeat was recorded for a running job.
    HeartbeatSent {
        /// The job whose heartbeat was refreshed.
        job_id: JobId,
    },
    /// A job reached a terminal or retry-scheduled outcome for this delivery.
    Completed {
        /// The job this outcome concerns.
        job_id: JobId,
        /// What happened.
        outcome: JobOutcome,
    },
}

/// The outcome of a single delivery attempt.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The job finished successfully.
    Done,
    /// The job failed and will be retried.
    RetryScheduled {
        /// The attempt number that failed.
        attempt: u32,
    },
    /// The job failed fatally or exhausted its retry budget.
    Failed {
        /// The failure reason.
        reason: String,
    },
    /// A zombie job (stale heartbeat) was recovered back to queued.
    ZombieRecovered,
}

/// Receives [`JobEvent`]s as the framework processes jobs.
pub trait TelemetrySink: Send + Sync {
    /// Records a single event. Must not block or panic.
    fn record(&self, event: JobEvent);
}

/// The default sink: re-emits every event as a structured `tracing` event.
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: JobEvent) {
        match event {
            JobEvent::Dequeued { job_id, topic, attempt } => {
                tracing::debug!(job_id = %job_id, topic, attempt, "job dequeued");
            }
            JobEvent::HeartbeatSent { job_id } => {
                tracing::trace!(job_id = %job_id, "heartbeat sent");
            }
            JobEvent::Completed { job_id, outcome } => match outcome {
                JobOutcome::Done => tracing::info!(job_id = %job_id, "job done"),
                JobOutcome::RetryScheduled { attempt } => {
                    tracing::info!(job_id = %job_id, attempt, "job retry scheduled");
                }
                JobOutcome::Failed { reason } => {
                    tracing::warn!(job_id = %job_id, reason, "job failed");
                }
                JobOutcome::ZombieRecovered => {
                    tracing::warn!(job_id = %job_id, "zombie job recovered");
                }
            },
        }
    }
}

/// A sink that discards every event; the `Framework` default.
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: JobEvent) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingSink(Mutex<Vec<String>>);

    impl TelemetrySink for RecordingSink {
        fn record(&self, event: JobEvent) {
            let label = match event {
                JobEvent::Dequeued { .. } => "dequeued",
                JobEvent::HeartbeatSent { .. } => "heartbeat",
                JobEvent::Completed { .. } => "completed",
            };
            self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(label.to_string());
        }
    }

    #[test]
    fn sink_receives_events_in_order() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        sink.record(JobEvent::Dequeued {
            job_id: JobId::new("job-1"),
            topic: "reconstruction".to_string(),
            attempt: 1,
        });
        sink.record(JobEvent::Completed { job_id: JobId::new("job-1"), outcome: JobOutcome::Done });
        let recorded = sink.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(*recorded, vec!["dequeued".to_string(), "completed".to_string()]);
    }
}
