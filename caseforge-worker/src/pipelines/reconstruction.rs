// caseforge-worker/src/pipelines/reconstruction.rs
// ============================================================================
// Module: Reconstruction Pipeline
// Description: 3D reconstruction from uploaded scan images, optionally
//              preceded by a point-of-view preprocessing sub-job.
// Purpose: Implement Worker for JobType::Reconstruction.
// Dependencies: async-trait, caseforge-core, serde, time, tokio, tracing
// ============================================================================

//! ## Overview
//! When `enable_preprocess` is set and no point-of-view images were
//! supplied, this pipeline enqueues a child `imagegen` job (four view
//! angles) and polls for it every two seconds, up to five minutes. A
//! failed or timed-out sub-job is not fatal: reconstruction proceeds on
//! the raw scan images alone, favoring a degraded result over failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caseforge_core::domain::scene::Pose;
use caseforge_core::interfaces::clients::GenType;
use caseforge_core::interfaces::clients::ImageGenInput;
use caseforge_core::interfaces::clients::ReconstructInput;
use caseforge_core::interfaces::clients::Resolution;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobStatus;
use caseforge_core::JobType;
use caseforge_core::ReconstructionClient;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

const POV_VIEW_ANGLES: [&str; 4] = ["front", "left", "right", "back"];
const SUB_JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SUB_JOB_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

fn default_enable_preprocess() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ReconstructionJobInput {
    scan_asset_keys: Vec<String>,
    #[serde(default)]
    camera_poses: Option<Vec<Pose>>,
    #[serde(default)]
    pov_asset_keys: Option<Vec<String>>,
    #[serde(default = "default_enable_preprocess")]
    enable_preprocess: bool,
}

#[derive(Debug, Serialize)]
struct ReconstructionJobOutput {
    commit_id: CommitId,
    object_count: usize,
    used_preprocess: bool,
}

/// Drives [`ReconstructionClient`] for `JobType::Reconstruction` jobs.
pub struct ReconstructionPipeline {
    client: Arc<dyn ReconstructionClient>,
}

impl ReconstructionPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ReconstructionClient>) -> Self {
        Self { client }
    }

    async fn run_preprocess_sub_job(
        &self,
        ctx: &WorkerContext,
        case_id: &caseforge_core::CaseId,
    ) -> Option<Vec<String>> {
        let payload = ImageGenInput {
            case_id: case_id.clone(),
            gen_type: GenType::ScenePov,
            resolution: Resolution::R1k,
            payload: serde_json::json!({ "view_angles": POV_VIEW_ANGLES }),
        };
        let input_json = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize pov sub-job input");
                return None;
            }
        };
        let job = Job::new(JobId::generate(), case_id.clone(), JobType::Imagegen, input_json, None, now());
        let job = match ctx.store.create_job(job).await {
            Ok(job) => job,
            Err(error) => {
                tracing::warn!(%error, "failed to create pov sub-job");
                return None;
            }
        };
        let message = JobMessage {
            job_id: job.id.clone(),
            case_id: case_id.clone(),
            job_type: JobType::Imagegen,
            input: job.input.clone(),
            attempts: 1,
        };
        if let Err(error) = ctx.queue.enqueue(message).await {
            tracing::warn!(%error, "failed to enqueue pov sub-job");
            return None;
        }

        let deadline = tokio::time::Instant::now() + SUB_JOB_POLL_TIMEOUT;
        loop {
            match ctx.store.get_job(&job.id).await {
                Ok(Some(sub_job)) if sub_job.status == JobStatus::Done => {
                    return sub_job
                        .output
                        .and_then(|output| serde_json::from_value::<ImageGenJobOutput>(output).ok())
                        .map(|output| output.asset_keys());
                }
                Ok(Some(sub_job)) if sub_job.status == JobStatus::Failed => {
                    tracing::info!(job_id = %job.id, "pov sub-job failed, proceeding with raw images");
                    return None;
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "failed to poll pov sub-job"),
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::info!(job_id = %job.id, "pov sub-job timed out, proceeding with raw images");
                return None;
            }
            tokio::time::sleep(SUB_JOB_POLL_INTERVAL).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageGenJobOutput {
    images: Vec<ImageGenJobOutputImage>,
}

#[derive(Debug, Deserialize)]
struct ImageGenJobOutputImage {
    asset_key: String,
}

impl ImageGenJobOutput {
    fn asset_keys(self) -> Vec<String> {
        self.images.into_iter().map(|image| image.asset_key).collect()
    }
}

fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}

#[async_trait]
impl Worker for ReconstructionPipeline {
    fn job_type(&self) -> JobType {
        JobType::Reconstruction
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ReconstructionJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let (pov_asset_keys, used_preprocess) = match input.pov_asset_keys {
            Some(keys) if !keys.is_empty() => (keys, false),
            _ if input.enable_preprocess => {
                let keys = self.run_preprocess_sub_job(ctx, &message.case_id).await.unwrap_or_default();
                let used = !keys.is_empty();
                (keys, used)
            }
            _ => (Vec::new(), false),
        };

        let pov_image_count = pov_asset_keys.len() as u32;
        let existing_scenegraph =
            ctx.store.get_scene_snapshot(&message.case_id).await?.map(|snapshot| snapshot.scenegraph);

        let output = self
            .client
            .reconstruct(ReconstructInput {
                case_id: message.case_id.clone(),
                scan_asset_keys: input.scan_asset_keys,
                pov_asset_keys,
                camera_poses: input.camera_poses,
                existing_scenegraph,
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        if let Some(mesh_key) = output.mesh_asset_key {
            pipelines::create_asset(
                ctx,
                &message.case_id,
                caseforge_core::AssetKind::Mesh,
                mesh_key,
                serde_json::json!({}),
            )
            .await?;
        }
        if let Some(pointcloud_key) = &output.pointcloud_asset_key {
            pipelines::create_asset(
                ctx,
                &message.case_id,
                caseforge_core::AssetKind::Pointcloud,
                pointcloud_key.clone(),
                serde_json::json!({}),
            )
            .await?;
        }

        let object_count = output.proposals.len();
        let diff = caseforge_core::SceneGraphDiff {
            objects: output.proposals,
            point_cloud_asset_key: output.pointcloud_asset_key,
            uncertainty_regions: (!output.uncertainty_regions.is_empty()).then_some(output.uncertainty_regions),
            ..Default::default()
        };
        let commit_id = CommitId::generate();
        let commit = pipelines::author_commit(
            ctx,
            commit_id.clone(),
            &message.case_id,
            None,
            CommitPayload::ReconstructionUpdate {
                job_id: message.job_id.clone(),
                diff,
                provenance: caseforge_core::domain::commit::ReconstructionProvenance {
                    raw_image_count: output.stats.input_image_count,
                    pov_image_count,
                    hybrid_mode: used_preprocess,
                },
                stats: output.stats,
            },
            "reconstruction update",
        )
        .await?;

        let job_output = ReconstructionJobOutput { commit_id: commit.id, object_count, used_preprocess };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_job_output_extracts_asset_keys() {
        let output = ImageGenJobOutput {
            images: vec![
                ImageGenJobOutputImage { asset_key: "a1".into() },
                ImageGenJobOutputImage { asset_key: "a2".into() },
            ],
        };
        assert_eq!(output.asset_keys(), vec!["a1".to_string(), "a2".to_string()]);
    }
}
