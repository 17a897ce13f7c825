// caseforge-core/src/interfaces/clients.rs
// ============================================================================
// Module: AI-Client Contracts
// Description: Narrow, mockable interfaces each domain pipeline depends on.
// Purpose: Define the eight AI-client traits, StorageClient, and the
//          shared ClientError taxonomy.
// Dependencies: async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! Every pipeline in `caseforge-worker::pipelines` depends only on one of
//! these traits, never on a concrete vendor SDK. `caseforge-clients` ships
//! a deterministic mock for each one so pipelines can be exercised
//! end-to-end without network access.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::commit::ModelStats;
use crate::domain::commit::NextStepSuggestion;
use crate::domain::commit::ProcessingStats;
use crate::domain::commit::Trajectory;
use crate::domain::identifiers::BranchId;
use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::ObjectId;
use crate::domain::scene::Constraint;
use crate::domain::scene::ObjectDelta;
use crate::domain::scene::ObjectType;
use crate::domain::scene::Pose;
use crate::domain::scene::SceneGraph;
use crate::domain::scene::UncertaintyRegion;

/// The classification a pipeline applies to a client error before
/// returning it to the worker framework: unclassified errors default to
/// [`ErrorClass::Retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The framework should retry per its backoff policy.
    Retryable,
    /// The framework should dead-letter the job immediately.
    Fatal,
}

/// An error returned by an AI-client or storage-client call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The model or vendor endpoint is temporarily unavailable.
    #[error("model unavailable")]
    ModelUnavailable,
    /// The caller-supplied input failed vendor-side validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The vendor returned a rate-limit response, optionally with a
    /// `Retry-After` hint in seconds.
    #[error("rate limited")]
    RateLimited {
        /// `Retry-After` hint, if the vendor provided one.
        retry_after: Option<Duration>,
    },
    /// A network error, timeout, or 5xx not otherwise classified.
    #[error("transient error: {0}")]
    Transient(String),
    /// A vendor response that retrying will not resolve (e.g. the replay
    /// pipeline's HTTP 204 / function-execution-timeout / specific 500s).
    #[error("vendor fatal error: {0}")]
    VendorFatal(String),
}

impl ClientError {
    /// The default classification applied when no per-client override is
    /// configured; vendor-specific overrides should come from
    /// configuration rather than be hardcoded here. This default is the
    /// fail-open-to-retry fallback.
    #[must_use]
    pub fn default_class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) | Self::VendorFatal(_) => ErrorClass::Fatal,
            Self::ModelUnavailable | Self::RateLimited { .. } | Self::Transient(_) => {
                ErrorClass::Retryable
            }
        }
    }
}

/// Input to [`ReconstructionClient::reconstruct`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructInput {
    /// The case being reconstructed.
    pub case_id: CaseId,
    /// Raw scan-asset storage keys; must be non-empty.
    pub scan_asset_keys: Vec<String>,
    /// Pre-generated point-of-view asset keys, if preprocessing ran.
    pub pov_asset_keys: Vec<String>,
    /// Known camera poses, if available.
    pub camera_poses: Option<Vec<Pose>>,
    /// The scenegraph to merge proposals into, if one already exists.
    pub existing_scenegraph: Option<SceneGraph>,
}

/// Output of [`ReconstructionClient::reconstruct`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructOutput {
    /// Scene-object proposals, each tagged create/update/remove.
    pub proposals: Vec<ObjectDelta>,
    /// Generated mesh asset key, if reconstruction produced one.
    pub mesh_asset_key: Option<String>,
    /// Generated point-cloud asset key, if reconstruction produced one.
    pub pointcloud_asset_key: Option<String>,
    /// Regions the client flagged as uncertain.
    pub uncertainty_regions: Vec<UncertaintyRegion>,
    /// Client-reported processing statistics.
    pub stats: ProcessingStats,
}

/// 3D reconstruction from scan and point-of-view images.
///
/// Fails: [`ClientError::ModelUnavailable`] (retryable),
/// [`ClientError::InvalidInput`] (fatal).
#[async_trait]
pub trait ReconstructionClient: Send + Sync {
    /// Reconstructs scene-object proposals from the supplied images.
    async fn reconstruct(&self, input: ReconstructInput) -> Result<ReconstructOutput, ClientError>;
}

/// The analysis mode requested of [`SceneAnalysisClient::analyze_scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneAnalysisMode {
    /// Detect and classify objects only.
    ObjectDetection,
    /// Search for potential evidence without full object detection.
    EvidenceSearch,
    /// Both object detection and evidence search.
    FullAnalysis,
}

/// Input to [`SceneAnalysisClient::analyze_scene`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysisInput {
    /// The case being analyzed.
    pub case_id: CaseId,
    /// Image storage keys to analyze.
    pub image_keys: Vec<String>,
    /// The analysis mode.
    pub mode: SceneAnalysisMode,
    /// Optional free-text query to focus the analysis.
    pub query: Option<String>,
}

/// A single object the scene-analysis client detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Stable identifier, unique within the case.
    pub id: ObjectId,
    /// Object category.
    pub object_type: ObjectType,
    /// Human-readable label.
    pub label: String,
    /// Free-text description of the object's position.
    pub position_description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the client flagged this object as suspicious.
    pub is_suspicious: bool,
    /// Free-text notes.
    pub notes: String,
    /// The image this detection was sourced from.
    pub source_image_key: String,
}

/// Output of [`SceneAnalysisClient::analyze_scene`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysisOutput {
    /// Objects the client detected.
    pub detected_objects: Vec<DetectedObject>,
    /// Free-text descriptions of potential evidence, converted into
    /// evidence cards by the pipeline.
    pub potential_evidence: Vec<String>,
    /// A free-text description of the overall scene.
    pub scene_description: String,
    /// Free-text anomaly notes.
    pub anomalies: Vec<String>,
    /// Identifier of the model or vendor used.
    pub model_used: String,
    /// Wall-clock milliseconds spent by the client call.
    pub elapsed_ms: u64,
}

/// Object detection and evidence search over scene images.
#[async_trait]
pub trait SceneAnalysisClient: Send + Sync {
    /// Analyzes one or more images for objects and potential evidence.
    async fn analyze_scene(&self, input: SceneAnalysisInput) -> Result<SceneAnalysisOutput, ClientError>;
}

/// Input to [`ReasoningClient::reason`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningInput {
    /// The case being reasoned over.
    pub case_id: CaseId,
    /// The scenegraph to reason over.
    pub scenegraph: SceneGraph,
    /// The branch this reasoning run is scoped to, if any.
    pub branch_id: Option<BranchId>,
    /// Constraint overrides to apply before reasoning.
    pub constraint_overrides: Option<Vec<Constraint>>,
    /// Thinking-token budget, default 8192, allowed `0..=24576`.
    pub thinking_budget: u32,
    /// Maximum number of trajectories to return, default 3.
    pub max_trajectories: u32,
}

/// Default thinking-token budget for a reasoning run.
pub const DEFAULT_THINKING_BUDGET: u32 = 8192;
/// Maximum allowed thinking-token budget for a reasoning run.
pub const MAX_THINKING_BUDGET: u32 = 24576;
/// Default maximum trajectories returned by a reasoning run.
pub const DEFAULT_MAX_TRAJECTORIES: u32 = 3;

/// Output of [`ReasoningClient::reason`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningOutput {
    /// Ranked hypotheses.
    pub trajectories: Vec<Trajectory>,
    /// Areas of persistent uncertainty.
    pub uncertainty_areas: Vec<String>,
    /// Suggested next investigative steps.
    pub next_steps: Vec<NextStepSuggestion>,
    /// A human-readable summary of the model's reasoning process.
    pub thinking_summary: String,
    /// Client-reported model statistics.
    pub model_stats: ModelStats,
}

/// LLM-driven reasoning over a case's scene graph.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Produces ranked trajectories and next-step suggestions.
    async fn reason(&self, input: ReasoningInput) -> Result<ReasoningOutput, ClientError>;
}

/// A single witness statement submitted for profile extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessStatementInput {
    /// Name of the reporting source.
    pub source_name: String,
    /// Statement content.
    pub content: String,
    /// Credibility in `[0, 1]`.
    pub credibility: f64,
}

/// Suspect-profile attribute extraction from witness statements.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Extracts attributes from `statements`, optionally informed by an
    /// `existing` profile.
    async fn extract_profile(
        &self,
        statements: Vec<WitnessStatementInput>,
        existing: Option<crate::domain::profile::SuspectAttributes>,
    ) -> Result<crate::domain::profile::SuspectAttributes, ClientError>;
}

/// The kind of image [`ImageGenClient::generate`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenType {
    /// A suspect portrait.
    Portrait,
    /// An evidence-board composite.
    EvidenceBoard,
    /// A side-by-side comparison image.
    Comparison,
    /// A figure for a report export.
    ReportFigure,
    /// One or more scene point-of-view renders.
    ScenePov,
    /// A cleaned-up version of an existing asset.
    AssetClean,
}

/// The requested output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 1K.
    R1k,
    /// 2K.
    R2k,
    /// 4K.
    R4k,
}

/// Input to [`ImageGenClient::generate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenInput {
    /// The case this image belongs to.
    pub case_id: CaseId,
    /// The kind of image to produce.
    pub gen_type: GenType,
    /// Output resolution tier.
    pub resolution: Resolution,
    /// Type-specific payload (portrait attributes, object ids, view
    /// angles, scene description, ...).
    pub payload: serde_json::Value,
}

/// A single generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// The view angle this image was rendered from, for `scene_pov` output.
    pub view_angle: Option<String>,
    /// Storage key of the full-resolution image.
    pub asset_key: String,
    /// Storage key of a generated thumbnail.
    pub thumbnail_key: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// Output of [`ImageGenClient::generate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenOutput {
    /// Generated images. For `scene_pov`, one per view angle; partial
    /// failures are tolerated but at least one image must succeed.
    pub images: Vec<GeneratedImage>,
    /// Identifier of the model or vendor used.
    pub model_used: String,
    /// Wall-clock milliseconds spent by the client call.
    pub generation_time_ms: u64,
    /// Estimated cost in USD, if the vendor reports one.
    pub cost_estimate: Option<f64>,
}

/// Image generation across portraits, scene renders, and report figures.
#[async_trait]
pub trait ImageGenClient: Send + Sync {
    /// Generates one or more images for the requested `gen_type`.
    async fn generate(&self, input: ImageGenInput) -> Result<ImageGenOutput, ClientError>;
}

/// Input to [`Asset3DClient::generate_3d_asset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset3DInput {
    /// The case this asset belongs to.
    pub case_id: CaseId,
    /// Reference image storage key.
    pub reference_image_key: String,
    /// Free-text item type (e.g. `"knife"`, `"chair"`).
    pub item_type: String,
    /// Free-text description.
    pub description: String,
    /// Whether to generate a textured mesh.
    pub with_texture: bool,
    /// Output mesh format, default `"glb"`.
    pub output_format: String,
}

/// Default output format for 3D asset synthesis.
pub const DEFAULT_ASSET3D_FORMAT: &str = "glb";

/// Output of [`Asset3DClient::generate_3d_asset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset3DOutput {
    /// Storage key of the generated mesh.
    pub mesh_asset_key: String,
    /// Storage key of a generated thumbnail, if any.
    pub thumbnail_asset_key: Option<String>,
    /// Mesh format.
    pub format: String,
    /// Whether the mesh has texture data.
    pub has_texture: bool,
    /// Vertex count, if reported.
    pub vertex_count: Option<u32>,
    /// Identifier of the model or vendor used.
    pub model_used: String,
    /// Wall-clock milliseconds spent by the client call.
    pub generation_time_ms: u64,
}

/// 3D asset synthesis from a reference image.
#[async_trait]
pub trait Asset3DClient: Send + Sync {
    /// Generates a 3D mesh from a reference image.
    async fn generate_3d_asset(&self, input: Asset3DInput) -> Result<Asset3DOutput, ClientError>;
}

/// The camera perspective requested of [`ReplayClient::generate_replay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// First-person camera.
    FirstPerson,
    /// Third-person camera.
    ThirdPerson,
}

/// Default frame count for a replay video.
pub const DEFAULT_REPLAY_FRAME_COUNT: u32 = 125;

/// Input to [`ReplayClient::generate_replay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayInput {
    /// The case this replay belongs to.
    pub case_id: CaseId,
    /// The reasoning trajectory to replay.
    pub trajectory_id: String,
    /// Camera perspective.
    pub perspective: Perspective,
    /// Frame count, default [`DEFAULT_REPLAY_FRAME_COUNT`].
    pub frame_count: u32,
    /// Resolution label (e.g. `"720p"`).
    pub resolution: String,
    /// Reference image storage key, if any.
    pub reference_image_key: Option<String>,
    /// Free-text scene description, if any.
    pub scene_description: Option<String>,
    /// Camera pose hint, if any.
    pub camera_pose_hint: Option<Pose>,
}

/// Output of [`ReplayClient::generate_replay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutput {
    /// Storage key of the generated video.
    pub video_asset_key: String,
    /// Storage key of a generated thumbnail.
    pub thumbnail_asset_key: String,
    /// Frames rendered.
    pub frame_count: u32,
    /// Frames per second.
    pub fps: u32,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Resolution label.
    pub resolution: String,
    /// Identifier of the model or vendor used.
    pub model_used: String,
    /// Wall-clock milliseconds spent by the client call.
    pub generation_time_ms: u64,
}

/// Video replay generation from a reasoning trajectory.
///
/// Certain vendor responses — HTTP 204, any timeout,
/// function-execution-timeout, HTTP 500 — are classified
/// [`ErrorClass::Fatal`] via [`ClientError::VendorFatal`]; everything else
/// is retryable.
#[async_trait]
pub trait ReplayClient: Send + Sync {
    /// Generates a replay video for the given trajectory.
    async fn generate_replay(&self, input: ReplayInput) -> Result<ReplayOutput, ClientError>;
}

/// Binary object storage: presigned URLs plus direct upload/download.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Generates a presigned upload URL for `key`, valid for `expiry`.
    async fn generate_upload_url(&self, key: &str, expiry: Duration) -> Result<String, ClientError>;
    /// Generates a presigned download URL for `key`, valid for `expiry`.
    async fn generate_download_url(&self, key: &str, expiry: Duration) -> Result<String, ClientError>;
    /// Uploads `bytes` under `key` with the given content type.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ClientError>;
    /// Downloads the bytes stored under `key`, along with their content type.
    async fn download(&self, key: &str) -> Result<(Vec<u8>, String), ClientError>;
    /// Deletes the object stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), ClientError>;
}
