// caseforge-worker/src/pipelines/scene_analysis.rs
// ============================================================================
// Module: Scene Analysis Pipeline
// Description: Object detection and evidence search over scene images.
// Purpose: Implement Worker for JobType::SceneAnalysis.
// Dependencies: async-trait, caseforge-core, serde, time
// ============================================================================

//! ## Overview
//! Detected objects carry no 3D geometry from this client (a 2D
//! vision pass), so each becomes a scene object with a minimal placeholder
//! pose/bbox at the origin, flagged `detected` (or `suspicious`) pending
//! reconciliation by a later reconstruction pass. Free-text
//! `potential_evidence` strings become evidence cards sourced from this
//! commit.

use std::sync::Arc;

use async_trait::async_trait;
use caseforge_core::domain::scene::Bbox;
use caseforge_core::domain::scene::EvidenceCard;
use caseforge_core::domain::scene::EvidenceSource;
use caseforge_core::domain::scene::EvidenceSourceKind;
use caseforge_core::domain::scene::ObjectDelta;
use caseforge_core::domain::scene::ObjectState;
use caseforge_core::domain::scene::Pose;
use caseforge_core::domain::scene::Quaternion;
use caseforge_core::domain::scene::SceneObject;
use caseforge_core::domain::scene::Vector3;
use caseforge_core::interfaces::clients::SceneAnalysisInput;
use caseforge_core::interfaces::clients::SceneAnalysisMode;
use caseforge_core::CommitId;
use caseforge_core::CommitPayload;
use caseforge_core::JobMessage;
use caseforge_core::JobType;
use caseforge_core::SceneAnalysisClient;
use caseforge_core::SceneGraphDiff;
use serde::Deserialize;
use serde::Serialize;

use crate::framework::Worker;
use crate::framework::WorkerContext;
use crate::framework::WorkerError;
use crate::pipelines;

/// Half the side length, in meters, of the placeholder bbox given to an
/// object detected without 3D geometry.
const PLACEHOLDER_HALF_EXTENT: f64 = 0.25;

#[derive(Debug, Deserialize)]
struct SceneAnalysisJobInput {
    image_keys: Vec<String>,
    mode: SceneAnalysisMode,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Serialize)]
struct SceneAnalysisJobOutput {
    commit_id: CommitId,
    detected_object_count: usize,
    evidence_count: usize,
}

/// Drives [`SceneAnalysisClient`] for `JobType::SceneAnalysis` jobs.
pub struct SceneAnalysisPipeline {
    client: Arc<dyn SceneAnalysisClient>,
}

impl SceneAnalysisPipeline {
    /// Builds the pipeline over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn SceneAnalysisClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Worker for SceneAnalysisPipeline {
    fn job_type(&self) -> JobType {
        JobType::SceneAnalysis
    }

    async fn process(&self, ctx: &WorkerContext, message: &JobMessage) -> Result<(), WorkerError> {
        if pipelines::already_committed(ctx, &message.job_id).await? {
            return Ok(());
        }
        let input: SceneAnalysisJobInput = pipelines::parse_input(&message.input)?;
        ctx.store.update_job_progress(&message.job_id, 10).await?;

        let output = self
            .client
            .analyze_scene(SceneAnalysisInput {
                case_id: message.case_id.clone(),
                image_keys: input.image_keys,
                mode: input.mode,
                query: input.query,
            })
            .await?;
        ctx.store.update_job_progress(&message.job_id, 70).await?;

        let commit_id = CommitId::generate();
        let detected_object_count = output.detected_objects.len();
        let objects = output
            .detected_objects
            .into_iter()
            .map(|detected| {
                ObjectDelta::Create(SceneObject {
                    id: detected.id,
                    object_type: detected.object_type,
                    label: detected.label,
                    pose: Pose { position: Vector3::ZERO, rotation: Quaternion::IDENTITY },
                    bbox: Bbox::new(
                        Vector3 {
                            x: -PLACEHOLDER_HALF_EXTENT,
                            y: -PLACEHOLDER_HALF_EXTENT,
                            z: -PLACEHOLDER_HALF_EXTENT,
                        },
                        Vector3 {
                            x: PLACEHOLDER_HALF_EXTENT,
                            y: PLACEHOLDER_HALF_EXTENT,
                            z: PLACEHOLDER_HALF_EXTENT,
                        },
                    ),
                    state: if detected.is_suspicious { ObjectState::Suspicious } else { ObjectState::Detected },
                    confidence: detected.confidence,
                    source_commit_ids: vec![commit_id.clone()],
                    evidence_ids: Vec::new(),
                    metadata: serde_json::json!({
                        "position_description": detected.position_description,
                        "notes": detected.notes,
                        "source_image_key": detected.source_image_key,
                    }),
                })
            })
            .collect();

        let evidence_count = output.potential_evidence.len();
        let evidence_added: Vec<EvidenceCard> = output
            .potential_evidence
            .into_iter()
            .enumerate()
            .map(|(index, description)| EvidenceCard {
                id: format!("{commit_id}-evidence-{index}"),
                object_ids: Vec::new(),
                title: description.chars().take(80).collect(),
                description,
                confidence: 0.5,
                sources: vec![EvidenceSource {
                    kind: EvidenceSourceKind::Inference,
                    commit_id: commit_id.clone(),
                    credibility: None,
                }],
                conflicting_sources: None,
            })
            .collect();

        let diff = SceneGraphDiff {
            objects,
            evidence: evidence_added
                .iter()
                .cloned()
                .map(caseforge_core::domain::scene::EvidenceDelta::Create)
                .collect(),
            ..Default::default()
        };

        let commit = pipelines::author_commit(
            ctx,
            commit_id,
            &message.case_id,
            None,
            CommitPayload::SceneAnalysisUpdate { job_id: message.job_id.clone(), diff, evidence_added },
            "scene analysis update",
        )
        .await?;

        let job_output = SceneAnalysisJobOutput { commit_id: commit.id, detected_object_count, evidence_count };
        ctx.store.update_job_output(&message.job_id, pipelines::to_output(&job_output)?).await?;
        Ok(())
    }
}
