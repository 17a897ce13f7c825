// caseforge-core/src/domain/job.rs
// ============================================================================
// Module: Job
// Description: An asynchronous unit of work processed by a worker.
// Purpose: Define Job, JobType, JobStatus, and the wire shape dequeued by
//          workers (JobMessage).
// Dependencies: serde, time
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::IdempotencyKey;
use crate::domain::identifiers::JobId;

/// The domain-specific kind of work a job performs; also the job queue's
/// topic name (see `caseforge-core::interfaces::queue`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// 3D reconstruction from scan images.
    Reconstruction,
    /// Image generation (portraits, POV renders, evidence boards, ...).
    Imagegen,
    /// LLM-driven reasoning over the scene graph.
    Reasoning,
    /// Suspect-profile extraction from witness statements.
    Profile,
    /// Scene analysis (object detection, evidence search).
    SceneAnalysis,
    /// 3D asset synthesis from a reference image.
    Asset3d,
    /// Video replay generation.
    Replay,
    /// Case report export.
    Export,
}

impl JobType {
    /// All job types, in a stable order — used to enumerate queue topics at
    /// startup.
    pub const ALL: [Self; 8] = [
        Self::Reconstruction,
        Self::Imagegen,
        Self::Reasoning,
        Self::Profile,
        Self::SceneAnalysis,
        Self::Asset3d,
        Self::Replay,
        Self::Export,
    ];

    /// Returns the queue topic name for this job type.
    #[must_use]
    pub fn topic(self) -> &'static str {
        match self {
            Self::Reconstruction => "reconstruction",
            Self::Imagegen => "imagegen",
            Self::Reasoning => "reasoning",
            Self::Profile => "profile",
            Self::SceneAnalysis => "scene_analysis",
            Self::Asset3d => "asset3d",
            Self::Replay => "replay",
            Self::Export => "export",
        }
    }
}

/// The lifecycle state of a job. See the state machine in
/// `caseforge-worker::framework` for the transitions between these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be dequeued.
    Queued,
    /// Currently being processed by a worker.
    Running,
    /// Completed successfully; `output` is set and `progress == 100`.
    Done,
    /// Terminally failed; `error` is set.
    Failed,
    /// Canceled by request.
    Canceled,
}

impl JobStatus {
    /// Returns whether this status is terminal (`done`, `failed`, or
    /// `canceled`).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }
}

/// An asynchronous unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique identifier.
    pub id: JobId,
    /// The case this job operates on.
    pub case_id: CaseId,
    /// The kind of work this job performs.
    pub job_type: JobType,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Progress in `[0, 100]`.
    pub progress: u8,
    /// Type-specific input payload.
    pub input: serde_json::Value,
    /// Type-specific output payload; present only when `status == done`.
    pub output: Option<serde_json::Value>,
    /// Error message; present only when `status == failed`.
    pub error: Option<String>,
    /// Caller-supplied deduplication key, globally unique when set.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Number of redelivery attempts so far.
    pub retry_count: u32,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last-modified timestamp; also serves as the heartbeat while running.
    pub updated_at: OffsetDateTime,
}

impl Job {
    /// Creates a freshly queued job with zero progress and no output.
    #[must_use]
    pub fn new(
        id: JobId,
        case_id: CaseId,
        job_type: JobType,
        input: serde_json::Value,
        idempotency_key: Option<IdempotencyKey>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            case_id,
            job_type,
            status: JobStatus::Queued,
            progress: 0,
            input,
            output: None,
            error: None,
            idempotency_key,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns whether this job's invariants hold: `progress` in range,
    /// `progress == 100` iff `status == done`, `output` set iff done,
    /// `error` set iff failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let progress_ok = (self.progress == 100) == (self.status == JobStatus::Done);
        let output_ok = self.output.is_some() == (self.status == JobStatus::Done);
        let error_ok = self.error.is_some() == (self.status == JobStatus::Failed);
        progress_ok && output_ok && error_ok
    }
}

/// The message a worker receives from [`crate::interfaces::queue::Queue::dequeue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    /// The job being delivered.
    pub job_id: JobId,
    /// The case the job operates on.
    pub case_id: CaseId,
    /// The job's type (and queue topic).
    pub job_type: JobType,
    /// The job's input payload, copied at enqueue time.
    pub input: serde_json::Value,
    /// Worker-visible delivery attempt count, starting at 1.
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn fresh_job_is_valid() {
        let job = Job::new(
            JobId::new("job-1"),
            CaseId::new("case-1"),
            JobType::Reconstruction,
            serde_json::json!({}),
            None,
            now(),
        );
        assert!(job.is_valid());
    }

    #[test]
    fn done_requires_full_progress_and_output() {
        let mut job = Job::new(
            JobId::new("job-1"),
            CaseId::new("case-1"),
            JobType::Reconstruction,
            serde_json::json!({}),
            None,
            now(),
        );
        job.status = JobStatus::Done;
        assert!(!job.is_valid());
        job.progress = 100;
        job.output = Some(serde_json::json!({"ok": true}));
        assert!(job.is_valid());
    }

    #[test]
    fn terminal_statuses_are_recognized() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
