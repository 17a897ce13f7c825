// caseforge-worker/src/pipelines/asset3d.rs
// ============================================================================
// Module: 3D Asset Synthesis Pipeline
// Description: Synthesizes a textured or untextured 3D mesh from a reference
//              image, for use as an evidence-board model.
// Purpose: Implement Worker for JobType::Asset3d.
// Dependencies: async-trait, caseforge-core, serde
// ============================================================================

//! ## Overview
//! No `CommitType` variant exists for this job type — the generated mesh
//! is a standalone asset, not a scene-graph change — so redelivery is
//! guarded by the job's own terminal status.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::interfaces::clients::Asset3DInput;
use caseforge_core::interfaces::clients::DEFAULT_ASSET3D_FORMAT;
use caseforge_core::domain::identifiers::AssetId;
use caseforge_core::Asset3DClient;
use caseforge_core::AssetKind;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct Asset3dJobInput {
    reference_image_key: String,
    item_type: String,
    description: String,
    #[serde(default)]
    with_texture: bool,
    #[serde(default)]
    output_format: Option<String>,
}

#[derive(Debug, Serialize)]
struct Asset3dJobOutput {
    asset_id: AssetId,
}

/// Drives [`Asset3DClient`] for `JobType::Asset3d` jobs.
pub struct Asset3dPipeline {
    client: Arc<dyn Asset3DClient>,
}

impl Asset3dPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn Asset3DClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Worker for Asset3dPipeline {
    fn job_type(&self) -> JobType {
        JobType::Asset3d
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::job_is_done(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: Asset3dJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let output = self
            .client
            .generate_3d_asset(Asset3DInput {
                case_id: message.case_id.clone(),
                reference_image_key: input.reference_image_key,
                item_type: input.item_type,
                description: input.description,
                with_texture: input.with_texture,
                output_format: input.output_format.unwrap_or_else(|| DEFAULT_ASSET3D_FORMAT.to_string()),
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let asset = pipelines::create_asset(
            ctx,
            &message.case_id,
            AssetKind::EvidenceModel,
            output.mesh_asset_key,
            serde_json::json!({
                "thumbnail_asset_key": output.thumbnail_asset_key,
                "format": output.format,
                "has_texture": output.has_texture,
                "vertex_count": output.vertex_count,
                "model_used": output.model_used,
                "generation_time_ms": output.generation_time_ms,
            }),
        )
        .await?;

        let job_output = Asset3dJobOutput { asset_id: asset.id };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
