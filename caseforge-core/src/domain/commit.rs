// caseforge-core/src/domain/commit.rs
// ============================================================================
// Module: Commit
// Description: Append-only timeline entries and their typed payloads.
// Purpose: Define Commit, CommitType, and the tagged-union CommitPayload.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A commit is an immutable append-only timeline entry. Its payload is
//! heterogeneous by [`CommitType`]; rather than store an opaque blob this
//! module models the payload as a tagged union ([`CommitPayload`]) so every
//! variant carries its own schema and the `type` tag round-trips through
//! serialization untouched.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::BranchId;
use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::CommitId;
use crate::domain::identifiers::JobId;
use crate::domain::scene::Constraint;
use crate::domain::scene::EvidenceCard;
use crate::domain::scene::SceneGraphDiff;
use crate::domain::scene::UncertaintyRegion;

/// Maximum length, in bytes, of a commit summary.
pub const MAX_SUMMARY_LEN: usize = 500;

/// The domain classification of a commit.
///
/// Kept alongside [`CommitPayload`]'s own tag for cheap filtering (e.g. an
/// index on `(case_id, commit_type)`) without deserializing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitType {
    /// A raw scan or image was uploaded.
    UploadScan,
    /// A witness statement was recorded.
    WitnessStatement,
    /// A human made a direct edit.
    ManualEdit,
    /// The reconstruction pipeline produced an update.
    ReconstructionUpdate,
    /// The profile pipeline produced an update.
    ProfileUpdate,
    /// The reasoning pipeline produced a result.
    ReasoningResult,
    /// The replay pipeline produced a video.
    ReplayGenerated,
    /// The scene-analysis pipeline produced an update.
    SceneAnalysisUpdate,
    /// The export pipeline produced a report.
    ExportReport,
}

/// A domain-specific classification attached to ingested artifacts, used by
/// reasoning as a weighting hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTier {
    /// Tier 0: environment.
    Environment,
    /// Tier 1: ground truth.
    GroundTruth,
    /// Tier 2: electronic logs.
    ElectronicLogs,
    /// Tier 3: testimonials.
    Testimonials,
}

/// Provenance metadata recorded on a `reconstruction_update` commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionProvenance {
    /// Number of raw scan images used.
    pub raw_image_count: u32,
    /// Number of generated point-of-view images used.
    pub pov_image_count: u32,
    /// Whether both raw and generated images were combined.
    pub hybrid_mode: bool,
}

/// Processing statistics recorded alongside a reconstruction update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Number of input images considered.
    pub input_image_count: u32,
    /// Number of objects the client detected.
    pub detected_object_count: u32,
    /// Wall-clock milliseconds spent by the client call.
    pub elapsed_ms: u64,
}

/// A conflict detected between two source statements for the same
/// suspect-profile attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConflict {
    /// The attribute name in conflict.
    pub attribute: String,
    /// The conflicting values observed, each with its source statement index.
    pub values: Vec<String>,
}

/// A single segment of a reasoning trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySegment {
    /// Index of this segment within its trajectory; ordering is meaningful.
    pub index: u32,
    /// Starting position.
    pub from: crate::domain::scene::Vector3,
    /// Ending position.
    pub to: crate::domain::scene::Vector3,
    /// Intermediate waypoints.
    pub waypoints: Vec<crate::domain::scene::Vector3>,
    /// Estimated time to traverse this segment, in seconds.
    pub time_estimate_s: f64,
    /// Evidence cards this segment relates to, tagged by relation.
    pub evidence_refs: Vec<EvidenceRef>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable explanation.
    pub explanation: String,
}

/// The relation an evidence card bears to a trajectory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceRelation {
    /// The evidence supports this segment.
    Supports,
    /// The evidence contradicts this segment.
    Contradicts,
    /// The evidence is neutral with respect to this segment.
    Neutral,
}

/// A weighted reference from a trajectory segment to an evidence card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// The referenced evidence card.
    pub evidence_id: String,
    /// How the evidence relates to the segment.
    pub relation: EvidenceRelation,
    /// Weight assigned to this reference.
    pub weight: f64,
}

/// A ranked hypothesis produced by the reasoning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Rank among trajectories returned for this run; lower is preferred.
    pub rank: u32,
    /// Ordered segments making up the trajectory.
    pub segments: Vec<TrajectorySegment>,
    /// Overall confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A suggested next investigative step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStepSuggestion {
    /// The kind of action suggested.
    pub suggestion_type: String,
    /// Human-readable description.
    pub description: String,
    /// Priority, higher is more urgent.
    pub priority: u32,
}

/// Model statistics recorded alongside a reasoning result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    /// Identifier of the model or vendor used.
    pub model_used: String,
    /// Wall-clock milliseconds spent by the client call.
    pub elapsed_ms: u64,
    /// Thinking-token budget actually consumed, if reported.
    pub thinking_tokens_used: Option<u32>,
}

/// The file format an export report was rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// A self-contained HTML document.
    Html,
    /// A PDF document.
    Pdf,
}

/// The heterogeneous payload of a commit, tagged by [`CommitType`].
///
/// Every worker-authored variant carries the id of the job that produced
/// it, so a commit can be looked up idempotently via
/// `GetCommitByJobID` (see [`CommitPayload::job_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommitPayload {
    /// A raw scan or image was uploaded.
    UploadScan {
        /// Storage keys of the uploaded assets.
        asset_keys: Vec<String>,
        /// Evidence tier assigned to this upload.
        tier: EvidenceTier,
    },
    /// A witness statement was recorded.
    WitnessStatement {
        /// Name of the reporting source.
        source_name: String,
        /// Statement content.
        content: String,
        /// Credibility in `[0, 1]`.
        credibility: f64,
    },
    /// A human made a direct edit to the scene graph.
    ManualEdit {
        /// Human-readable description of the edit.
        description: String,
        /// The scene-graph diff applied.
        diff: SceneGraphDiff,
    },
    /// The reconstruction pipeline produced an update.
    ReconstructionUpdate {
        /// The job that authored this commit.
        job_id: JobId,
        /// The scene-graph diff applied.
        diff: SceneGraphDiff,
        /// Provenance of the images used.
        provenance: ReconstructionProvenance,
        /// Client-reported processing statistics.
        stats: ProcessingStats,
    },
    /// The scene-analysis pipeline produced an update.
    SceneAnalysisUpdate {
        /// The job that authored this commit.
        job_id: JobId,
        /// The scene-graph diff applied.
        diff: SceneGraphDiff,
        /// New evidence cards synthesized from potential-evidence strings.
        evidence_added: Vec<EvidenceCard>,
    },
    /// The profile pipeline produced an update.
    ProfileUpdate {
        /// The job that authored this commit.
        job_id: JobId,
        /// The merged attribute set, serialized generically.
        attributes: serde_json::Value,
        /// Conflicts detected while merging.
        conflicts: Vec<AttributeConflict>,
    },
    /// The reasoning pipeline produced a result.
    ReasoningResult {
        /// The job that authored this commit.
        job_id: JobId,
        /// The branch this result is attached to, if any.
        branch_id: Option<BranchId>,
        /// Ranked trajectories.
        trajectories: Vec<Trajectory>,
        /// Areas of persistent uncertainty.
        uncertainty_areas: Vec<String>,
        /// Suggested next steps.
        next_steps: Vec<NextStepSuggestion>,
        /// A human-readable summary of the model's reasoning.
        thinking_summary: String,
        /// Client-reported model statistics.
        model_stats: ModelStats,
    },
    /// The replay pipeline produced a video.
    ReplayGenerated {
        /// The job that authored this commit.
        job_id: JobId,
        /// The created replay-video asset.
        asset_id: crate::domain::identifiers::AssetId,
        /// Number of frames rendered.
        frame_count: u32,
        /// Frames per second.
        fps: u32,
        /// Duration in milliseconds.
        duration_ms: u64,
        /// Resolution label (e.g. `"720p"`).
        resolution: String,
    },
    /// The export pipeline produced a report.
    ExportReport {
        /// The job that authored this commit.
        job_id: JobId,
        /// The created report asset.
        asset_id: crate::domain::identifiers::AssetId,
        /// The rendered format.
        format: ExportFormat,
    },
}

impl CommitPayload {
    /// Returns the id of the job that authored this commit, if any.
    ///
    /// `upload_scan`, `witness_statement`, and `manual_edit` are
    /// user-authored and carry no job id.
    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::UploadScan { .. } | Self::WitnessStatement { .. } | Self::ManualEdit { .. } => {
                None
            }
            Self::ReconstructionUpdate { job_id, .. }
            | Self::SceneAnalysisUpdate { job_id, .. }
            | Self::ProfileUpdate { job_id, .. }
            | Self::ReasoningResult { job_id, .. }
            | Self::ReplayGenerated { job_id, .. }
            | Self::ExportReport { job_id, .. } => Some(job_id),
        }
    }

    /// Returns the [`CommitType`] tag matching this payload's variant.
    #[must_use]
    pub fn commit_type(&self) -> CommitType {
        match self {
            Self::UploadScan { .. } => CommitType::UploadScan,
            Self::WitnessStatement { .. } => CommitType::WitnessStatement,
            Self::ManualEdit { .. } => CommitType::ManualEdit,
            Self::ReconstructionUpdate { .. } => CommitType::ReconstructionUpdate,
            Self::SceneAnalysisUpdate { .. } => CommitType::SceneAnalysisUpdate,
            Self::ProfileUpdate { .. } => CommitType::ProfileUpdate,
            Self::ReasoningResult { .. } => CommitType::ReasoningResult,
            Self::ReplayGenerated { .. } => CommitType::ReplayGenerated,
            Self::ExportReport { .. } => CommitType::ExportReport,
        }
    }

    /// Extracts the scene-graph diff this payload carries, if any.
    ///
    /// `profile_update`, `reasoning_result`, `replay_generated`, and
    /// `export_report` do not touch the scene graph.
    #[must_use]
    pub fn scene_diff(&self) -> Option<&SceneGraphDiff> {
        match self {
            Self::ManualEdit { diff, .. }
            | Self::ReconstructionUpdate { diff, .. }
            | Self::SceneAnalysisUpdate { diff, .. } => Some(diff),
            _ => None,
        }
    }
}

/// An immutable append-only timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Opaque unique identifier.
    pub id: CommitId,
    /// The case this commit belongs to.
    pub case_id: CaseId,
    /// The preceding commit on the same chain, if not the case root.
    pub parent_commit_id: Option<CommitId>,
    /// The branch this commit belongs to, if not on the main branch.
    pub branch_id: Option<BranchId>,
    /// The typed payload.
    pub payload: CommitPayload,
    /// A short human-readable summary, `<=` [`MAX_SUMMARY_LEN`] bytes.
    pub summary: String,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Optional correlation id threaded from the originating request or job.
    pub trace_id: Option<crate::domain::identifiers::CorrelationId>,
}

/// Error returned when a commit cannot be constructed from caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitValidationError {
    /// The summary exceeded [`MAX_SUMMARY_LEN`] bytes.
    #[error("commit summary exceeds {MAX_SUMMARY_LEN} bytes")]
    SummaryTooLong,
}

impl Commit {
    /// Returns the commit's [`CommitType`].
    #[must_use]
    pub fn commit_type(&self) -> CommitType {
        self.payload.commit_type()
    }

    /// Validates the summary length; the rest of `Commit` is assumed
    /// well-formed by construction.
    ///
    /// # Errors
    /// Returns [`CommitValidationError::SummaryTooLong`] if the summary
    /// exceeds [`MAX_SUMMARY_LEN`] bytes.
    pub fn validate(&self) -> Result<(), CommitValidationError> {
        if self.summary.len() > MAX_SUMMARY_LEN {
            return Err(CommitValidationError::SummaryTooLong);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_none_for_user_authored_variants() {
        let payload = CommitPayload::UploadScan {
            asset_keys: vec!["k1.jpg".into()],
            tier: EvidenceTier::GroundTruth,
        };
        assert_eq!(payload.job_id(), None);
    }

    #[test]
    fn job_id_is_present_for_worker_authored_variants() {
        let payload = CommitPayload::ReconstructionUpdate {
            job_id: JobId::new("job-1"),
            diff: SceneGraphDiff::default(),
            provenance: ReconstructionProvenance {
                raw_image_count: 2,
                pov_image_count: 0,
                hybrid_mode: false,
            },
            stats: ProcessingStats {
                input_image_count: 2,
                detected_object_count: 2,
                elapsed_ms: 10,
            },
        };
        assert_eq!(payload.job_id(), Some(&JobId::new("job-1")));
        assert_eq!(payload.commit_type(), CommitType::ReconstructionUpdate);
    }

    #[test]
    fn commit_payload_round_trips_through_json_with_type_tag() {
        let payload = CommitPayload::WitnessStatement {
            source_name: "neighbor".into(),
            content: "heard a crash".into(),
            credibility: 0.7,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "witness_statement");
        let back: CommitPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload, back);
    }
}
