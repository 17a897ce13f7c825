// caseforge-worker/src/pipelines/export.rs
// ============================================================================
// Module: Export Pipeline
// Description: Renders a case's current state (or a branch's) into a
//              self-contained report and uploads it to storage.
// Purpose: Implement Worker for JobType::Export.
// Dependencies: async-trait, caseforge-core, serde
// ============================================================================

//! ## Overview
//! Unlike every other pipeline, export calls no AI-vendor client — the
//! report is assembled locally from the case's scene graph and suspect
//! profile and pushed through [`StorageClient`] directly, so this pipeline
//! is constructed with a storage client instead of one of the eight
//! AI-client traits.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::commit::ExportFormat;
use caseforge_core::domain::identifiers::AssetId;
use caseforge_core::domain::scene::SceneGraph;
use caseforge_core::AssetKind;
use caseforge_core::BranchId;
use caseforge_core::CaseId;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::StorageClient;
use caseforge_core::SuspectProfile;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct ExportJobInput {
    format: ExportFormat,
    #[serde(default)]
    branch_id: Option<BranchId>,
}

#[derive(Debug, Serialize)]
struct ExportJobOutput {
    commit_id: CommitId,
    asset_id: AssetId,
}

/// Renders and uploads a case report for `JobType::Export` jobs.
pub struct ExportPipeline {
    storage: Arc<dyn StorageClient>,
}

impl ExportPipeline {
    /// Builds the pipeline over the given storage client.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    async fn resolve_scenegraph(
        &self,
        ctx: &WorkerContext,
        case_id: &CaseId,
        branch_id: Option<&BranchId>,
    ) -> Result<SceneGraph, WorkerError> {
        let Some(branch_id) = branch_id else {
            return Ok(ctx.store.get_scene_snapshot(case_id).await?.map_or_else(SceneGraph::empty, |s| s.scenegraph));
        };
        let head_commit_id = match ctx.store.get_latest_commit_on_branch(case_id, branch_id).await? {
            Some(commit) => commit.id,
            None => {
                let branch = ctx
                    .store
                    .get_branch(branch_id)
                    .await?
                    .ok_or_else(|| WorkerError::Fatal(format!("branch {branch_id} not found")))?;
                branch.base_commit_id
            }
        };
        Ok(ctx.store.replay_to_commit(case_id, &head_commit_id).await?)
    }

    fn extension(format: ExportFormat) -> &'static str {
        match format {
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
        }
    }

    fn render_report(case: &caseforge_core::Case, scenegraph: &SceneGraph, profile: &Option<SuspectProfile>, format: ExportFormat) -> (Vec<u8>, &'static str) {
        let attributes = profile
            .as_ref()
            .map(|p| serde_json::to_string_pretty(&p.attributes).unwrap_or_default())
            .unwrap_or_else(|| "no suspect profile recorded".to_string());
        let body = format!(
            "# Case Report: {}\n\n{}\n\n## Scene Objects ({})\n\n## Evidence ({})\n\n## Suspect Attributes\n\n{}\n",
            case.title,
            case.description.as_deref().unwrap_or(""),
            scenegraph.objects.len(),
            scenegraph.evidence_cards.len(),
            attributes,
        );
        match format {
            ExportFormat::Html => {
                let html = format!("<html><body><pre>{body}</pre></body></html>");
                (html.into_bytes(), "text/html")
            }
            ExportFormat::Pdf => (body.into_bytes(), "application/pdf"),
        }
    }
}

#[async_trait]
impl Worker for ExportPipeline {
    fn job_type(&self) -> JobType {
        JobType::Export
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ExportJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let case = ctx
            .store
            .get_case(&message.case_id)
            .await?
            .ok_or_else(|| WorkerError::Fatal(format!("case {} not found", message.case_id)))?;
        let scenegraph = self.resolve_scenegraph(ctx, &message.case_id, input.branch_id.as_ref()).await?;
        let profile = ctx.store.get_suspect_profile(&message.case_id).await?;
        ctx.store.update_job_progress(&message.job_id, 40).await?;

        let (bytes, content_type) = Self::render_report(&case, &scenegraph, &profile, input.format);
        let storage_key = format!("exports/{}/{}.{}", message.case_id, message.job_id, Self::extension(input.format));
        self.storage.upload(&storage_key, bytes, content_type).await?;
        ctx.store.update_job_progress(&message.job_id, 80).await?;

        let asset = pipelines::create_asset(
            ctx,
            &message.case_id,
            AssetKind::Report,
            storage_key,
            serde_json::json!({ "format": input.format }),
        )
        .await?;

        let commit_id = CommitId::generate();
        let commit = pipelines::author_commit(
            ctx,
            commit_id,
            &message.case_id,
            input.branch_id,
            CommitPayload::ExportReport { job_id: message.job_id.clone(), asset_id: asset.id.clone(), format: input.format },
            "export report",
        )
        .await?;

        let job_output = ExportJobOutput { commit_id: commit.id, asset_id: asset.id };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
