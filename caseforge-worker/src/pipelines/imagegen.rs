// caseforge-worker/src/pipelines/imagegen.rs
// ============================================================================
// Module: Image Generation Pipeline
// Description: Produces portraits, scene point-of-view renders, evidence
//              boards, and other generated images.
// Purpose: Implement Worker for JobType::Imagegen.
// Dependencies: async-trait, caseforge-core, serde, time
// ============================================================================

//! ## Overview
//! This pipeline authors no commit — it is often itself a child job spawned
//! by [`crate::pipelines::reconstruction`] or
//! [`crate::pipelines::profile`] — so redelivery is guarded by the job's
//! own terminal status rather than `GetCommitByJobID`. A `portrait` result
//! updates the case's suspect profile directly.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::identifiers::AssetId;
use caseforge_core::interfaces::clients::GenType;
use caseforge_core::interfaces::clients::ImageGenInput;
use caseforge_core::interfaces::clients::Resolution;
use caseforge_core::AssetKind;
use caseforge_core::ImageGenClient;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct ImagegenJobInput {
    gen_type: GenType,
    #[serde(default = "default_resolution")]
    resolution: Resolution,
    #[serde(default)]
    payload: serde_json::Value,
}

fn default_resolution() -> Resolution {
    Resolution::R1k
}

#[derive(Debug, Serialize)]
struct ImagegenJobOutput {
    asset_ids: Vec<AssetId>,
    model_used: String,
}

/// Drives [`ImageGenClient`] for `JobType::Imagegen` jobs.
pub struct ImagegenPipeline {
    client: Arc<dyn ImageGenClient>,
}

impl ImagegenPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ImageGenClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Worker for ImagegenPipeline {
    fn job_type(&self) -> JobType {
        JobType::Imagegen
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::job_is_done(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ImagegenJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let gen_type = input.gen_type;
        let output = self
            .client
            .generate(ImageGenInput {
                case_id: message.case_id.clone(),
                gen_type,
                resolution: input.resolution,
                payload: input.payload,
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let kind = if matches!(gen_type, GenType::Portrait) { AssetKind::Portrait } else { AssetKind::GeneratedImage };
        let mut asset_ids = Vec::with_capacity(output.images.len());
        for image in &output.images {
            let asset = pipelines::create_asset(
                ctx,
                &message.case_id,
                kind,
                image.asset_key.clone(),
                serde_json::json!({
                    "width": image.width,
                    "height": image.height,
                    "thumbnail_key": image.thumbnail_key,
                    "view_angle": image.view_angle,
                    "model_used": output.model_used,
                }),
            )
            .await?;
            asset_ids.push(asset.id);
        }

        if matches!(gen_type, GenType::Portrait) {
            if let Some(asset_key) = output.images.first().map(|image| image.asset_key.clone()) {
                let mut profile = ctx
                    .store
                    .get_suspect_profile(&message.case_id)
                    .await?
                    .unwrap_or_else(|| caseforge_core::SuspectProfile::empty(message.case_id.clone(), OffsetDateTime::now_utc()));
                profile.portrait_asset_key = Some(asset_key);
                profile.updated_at = OffsetDateTime::now_utc();
                ctx.store.upsert_suspect_profile(profile).await?;
            }
        }

        let job_output = ImagegenJobOutput { asset_ids, model_used: output.model_used };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
