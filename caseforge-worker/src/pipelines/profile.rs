// caseforge-worker/src/pipelines/profile.rs
// ============================================================================
// Module: Profile Pipeline
// Description: Merges a single witness statement into the case's suspect
//              profile, and triggers portrait generation once enough
//              attributes clear the confidence threshold.
// Purpose: Implement Worker for JobType::Profile.
// Dependencies: async-trait, caseforge-core, serde, time, tracing
// ============================================================================

//! ## Overview
//! One job covers exactly one witness statement, tied to the commit that
//! recorded it. The extracted attributes are merged into whatever profile
//! already exists via [`SuspectAttributes::merge`], and the merge is also
//! used locally to detect per-field conflicts between old and new values.
//! Crossing the portrait threshold for the first time fires a child
//! `imagegen` job; that job is not awaited, since a delayed or failed
//! portrait must not hold up the profile update itself.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::commit::AttributeConflict;
use caseforge_core::domain::identifiers::CommitId;
use caseforge_core::domain::profile::SuspectAttributes;
use caseforge_core::domain::profile::SuspectProfile;
use caseforge_core::interfaces::clients::GenType;
use caseforge_core::interfaces::clients::ImageGenInput;
use caseforge_core::interfaces::clients::Resolution;
use caseforge_core::interfaces::clients::WitnessStatementInput;
use caseforge_core::CommitPayload;
use caseforge_core::Job;
use caseforge_core::JobId;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::ProfileClient;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

#[derive(Debug, Deserialize)]
struct ProfileJobInput {
    statement: WitnessStatementInput,
    witness_commit_id: CommitId,
}

#[derive(Debug, Serialize)]
struct ProfileJobOutput {
    commit_id: CommitId,
    crossed_portrait_threshold: bool,
}

/// Drives [`ProfileClient`] for `JobType::Profile` jobs.
pub struct ProfilePipeline {
    client: Arc<dyn ProfileClient>,
}

impl ProfilePipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ProfileClient>) -> Self {
        Self { client }
    }

    async fn enqueue_portrait_job(&self, ctx: &WorkerContext, case_id: &caseforge_core::CaseId, attributes: &SuspectAttributes) {
        let payload = ImageGenInput {
            case_id: case_id.clone(),
            gen_type: GenType::Portrait,
            resolution: Resolution::R1k,
            payload: serde_json::json!({ "attributes": attributes }),
        };
        let input_json = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize portrait sub-job input");
                return;
            }
        };
        let job = Job::new(JobId::generate(), case_id.clone(), JobType::Imagegen, input_json, None, OffsetDateTime::now_utc());
        let job = match ctx.store.create_job(job).await {
            Ok(job) => job,
            Err(error) => {
                tracing::warn!(%error, "failed to create portrait sub-job");
                return;
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
            tracing::warn!(%error, "failed to enqueue portrait sub-job");
        }
    }
}

fn conflict_for(attribute: &str, before: Option<&serde_json::Value>, after: Option<&serde_json::Value>) -> Option<AttributeConflict> {
    match (before, after) {
        (Some(before), Some(after)) if before != after => Some(AttributeConflict {
            attribute: attribute.to_string(),
            values: vec![before.to_string(), after.to_string()],
        }),
        _ => None,
    }
}

fn detect_conflicts(before: &SuspectAttributes, after: &SuspectAttributes) -> Vec<AttributeConflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(conflict_for(
        "age_range",
        before.age_range.as_ref().map(|a| &a.value),
        after.age_range.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for(
        "height_range_cm",
        before.height_range_cm.as_ref().map(|a| &a.value),
        after.height_range_cm.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for("build", before.build.as_ref().map(|a| &a.value), after.build.as_ref().map(|a| &a.value)));
    conflicts.extend(conflict_for(
        "skin_tone",
        before.skin_tone.as_ref().map(|a| &a.value),
        after.skin_tone.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for(
        "hair.color",
        before.hair.color.as_ref().map(|a| &a.value),
        after.hair.color.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for(
        "hair.style",
        before.hair.style.as_ref().map(|a| &a.value),
        after.hair.style.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for(
        "facial_hair",
        before.facial_hair.as_ref().map(|a| &a.value),
        after.facial_hair.as_ref().map(|a| &a.value),
    ));
    conflicts.extend(conflict_for(
        "glasses",
        before.glasses.as_ref().map(|a| &a.value),
        after.glasses.as_ref().map(|a| &a.value),
    ));
    conflicts
}

#[async_trait]
impl Worker for ProfilePipeline {
    fn job_type(&self) -> JobType {
        JobType::Profile
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: ProfileJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let existing_profile = ctx.store.get_suspect_profile(&message.case_id).await?;
        let existing_attributes = existing_profile.as_ref().map(|p| p.attributes.clone()).unwrap_or_default();

        let extracted =
            self.client.extract_profile(vec![input.statement], Some(existing_attributes.clone())).await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let merged = existing_attributes.merge(&extracted);
        let conflicts = detect_conflicts(&existing_attributes, &merged);
        let had_portrait_already = existing_profile.as_ref().is_some_and(|p| p.portrait_asset_key.is_some());
        let crossed_portrait_threshold = !had_portrait_already && merged.meets_portrait_threshold();

        let commit_id = CommitId::generate();
        let commit = pipelines::author_commit(
            ctx,
            commit_id,
            &message.case_id,
            None,
            CommitPayload::ProfileUpdate {
                job_id: message.job_id.clone(),
                attributes: serde_json::to_value(&merged)
                    .map_err(|error| WorkerError::Fatal(format!("failed to serialize merged attributes: {error}")))?,
                conflicts,
            },
            "profile update",
        )
        .await?;

        let updated_profile = SuspectProfile {
            case_id: message.case_id.clone(),
            last_commit_id: Some(commit.id.clone()),
            attributes: merged.clone(),
            portrait_asset_key: existing_profile.and_then(|p| p.portrait_asset_key),
            updated_at: OffsetDateTime::now_utc(),
        };
        ctx.store.upsert_suspect_profile(updated_profile).await?;

        if crossed_portrait_threshold {
            self.enqueue_portrait_job(ctx, &message.case_id, &merged).await;
        }

        let job_output = ProfileJobOutput { commit_id: commit.id, crossed_portrait_threshold };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_conflicts_flags_differing_scalar_values() {
        let mut before = SuspectAttributes::default();
        before.build = Some(caseforge_core::domain::profile::AttributeValue {
            value: serde_json::json!("athletic"),
            confidence: 0.6,
            supporting_sources: Vec::new(),
            conflicting_sources: Vec::new(),
        });
        let mut after = before.clone();
        after.build = Some(caseforge_core::domain::profile::AttributeValue {
            value: serde_json::json!("stocky"),
            confidence: 0.8,
            supporting_sources: Vec::new(),
            conflicting_sources: Vec::new(),
        });
        let conflicts = detect_conflicts(&before, &after);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].attribute, "build");
    }

    #[test]
    fn detect_conflicts_ignores_agreeing_values() {
        let attrs = SuspectAttributes::default();
        assert!(detect_conflicts(&attrs, &attrs).is_empty());
    }
}
