// caseforge-worker/src/pipelines/reasoning.rs
// ============================================================================
// Module: Reasoning Pipeline
// Description: LLM-driven reasoning over a case's materialized scene graph,
//              optionally scoped to a branch.
// Purpose: Implement Worker for JobType::Reasoning.
// Dependencies: async-trait, caseforge-core, serde
// ============================================================================

//! ## Overview
//! A branch's scene graph is the fold of its own commits plus every
//! ancestor commit back to the case root (branch visibility is inclusive),
//! so reasoning scoped to a branch replays to that branch's newest commit
//! rather than reading the case's main snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::scene::Constraint;
use caseforge_core::domain::scene::SceneGraph;
use caseforge_core::interfaces::clients::ReasoningInput;
use caseforge_core::interfaces::clients::DEFAULT_MAX_TRAJECTORIES;
use caseforge_core::interfaces::clients::DEFAULT_THINKING_BUDGET;
use caseforge_core::interfaces::clients::MAX_THINKING_BUDGET;
use caseforge_core::BranchId;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::ReasoningClient;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct ReasoningJobInput {
    #[serde(default)]
    branch_id: Option<BranchId>,
    #[serde(default)]
    constraint_overrides: Option<Vec<Constraint>>,
    #[serde(default)]
    thinking_budget: Option<u32>,
    #[serde(default)]
    max_trajectories: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ReasoningJobOutput {
    commit_id: CommitId,
    trajectory_count: usize,
}

/// Drives [`ReasoningClient`] for `JobType::Reasoning` jobs.
pub struct ReasoningPipeline {
    client: Arc<dyn ReasoningClient>,
}

impl ReasoningPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self { client }
    }

    async fn resolve_scenegraph(
        &self,
        ctx: &WorkerContext,
        case_id: &caseforge_core::CaseId,
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
}

#[async_trait]
impl Worker for ReasoningPipeline {
    fn job_type(&self) -> JobType {
        JobType::Reasoning
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ReasoningJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let scenegraph = self.resolve_scenegraph(ctx, &message.case_id, input.branch_id.as_ref()).await?;

        let output = self
            .client
            .reason(ReasoningInput {
                case_id: message.case_id.clone(),
                scenegraph,
                branch_id: input.branch_id.clone(),
                constraint_overrides: input.constraint_overrides,
                thinking_budget: input.thinking_budget.unwrap_or(DEFAULT_THINKING_BUDGET).min(MAX_THINKING_BUDGET),
                max_trajectories: input.max_trajectories.unwrap_or(DEFAULT_MAX_TRAJECTORIES),
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let trajectory_count = output.trajectories.len();
        let commit_id = CommitId::generate();
        let commit = pipelines::author_commit(
            ctx,
            commit_id,
            &message.case_id,
            input.branch_id.clone(),
            CommitPayload::ReasoningResult {
                job_id: message.job_id.clone(),
                branch_id: input.branch_id,
                trajectories: output.trajectories,
                uncertainty_areas: output.uncertainty_areas,
                next_steps: output.next_steps,
                thinking_summary: output.thinking_summary,
                model_stats: output.model_stats,
            },
            "reasoning result",
        )
        .await?;

        let job_output = ReasoningJobOutput { commit_id: commit.id, trajectory_count };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
