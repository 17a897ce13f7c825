// caseforge-worker/src/pipelines/replay.rs
// ============================================================================
// Module: Replay Pipeline
// Description: Renders a reasoning trajectory as a video replay.
// Purpose: Implement Worker for JobType::Replay.
// Dependencies: async-trait, caseforge-core, serde
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::scene::Pose;
use caseforge_core::interfaces::clients::Perspective;
use caseforge_core::interfaces::clients::ReplayInput;
use caseforge_core::interfaces::clients::DEFAULT_REPLAY_FRAME_COUNT;
use caseforge_core::AssetKind;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::ReplayClient;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct ReplayJobInput {
    trajectory_id: String,
    perspective: Perspective,
    #[serde(default)]
    frame_count: Option<u32>,
    resolution: String,
    #[serde(default)]
    reference_image_key: Option<String>,
    #[serde(default)]
    scene_description: Option<String>,
    #[serde(default)]
    camera_pose_hint: Option<Pose>,
}

#[derive(Debug, Serialize)]
struct ReplayJobOutput {
    commit_id: CommitId,
    asset_id: caseforge_core::domain::identifiers::AssetId,
}

/// Drives [`ReplayClient`] for `JobType::Replay` jobs.
pub struct ReplayPipeline {
    client: Arc<dyn ReplayClient>,
}

impl ReplayPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ReplayClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Worker for ReplayPipeline {
    fn job_type(&self) -> JobType {
        JobType::Replay
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ReplayJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let output = self
            .client
            .generate_replay(ReplayInput {
                case_id: message.case_id.clone(),
                trajectory_id: input.trajectory_id,
                perspective: input.perspective,
                frame_count: input.frame_count.unwrap_or(DEFAULT_REPLAY_FRAME_COUNT),
                resolution: input.resolution,
                reference_image_key: input.reference_image_key,
                scene_description: input.scene_description,
                camera_pose_hint: input.camera_pose_hint,
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let asset = pipelines::create_asset(
            ctx,
            &message.case_id,
            AssetKind::ReplayVideo,
            output.video_asset_key,
            serde_json::json!({
                "thumbnail_asset_key": output.thumbnail_asset_key,
                "fps": output.fps,
                "duration_ms": output.duration_ms,
                "resolution": output.resolution,
                "model_used": output.model_used,
            }),
        )
        .await?;

        let commit_id = CommitId::generate();
        let commit = pipelines::author_commit(
            ctx,
            commit_id,
            &message.case_id,
            None,
            CommitPayload::ReplayGenerated {
                job_id: message.job_id.clone(),
                asset_id: asset.id.clone(),
                frame_count: output.frame_count,
                fps: output.fps,
                duration_ms: output.duration_ms,
                resolution: output.resolution,
            },
            "replay generated",
        )
        .await?;

        let job_output = ReplayJobOutput { commit_id: commit.id, asset_id: asset.id };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
