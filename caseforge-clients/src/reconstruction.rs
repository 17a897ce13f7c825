// caseforge-clients/src/reconstruction.rs
// ============================================================================
// Module: Mock Reconstruction Client
// Description: Deterministic stand-in for a 3D reconstruction vendor.
// Purpose: Implement ReconstructionClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

//! ## Overview
//! Produces one `Create` proposal per scan image, each a generic
//! `Furniture` placeholder positioned along the X axis so repeated runs
//! over the same input are reproducible and visually distinguishable.

use async_trait::async_trait;
use caseforge_core::domain::commit::ProcessingStats;
use caseforge_core::domain::identifiers::ObjectId;
use caseforge_core::domain::scene::Bbox;
use caseforge_core::domain::scene::ObjectDelta;
use caseforge_core::domain::scene::ObjectState;
use caseforge_core::domain::scene::ObjectType;
use caseforge_core::domain::scene::Pose;
use caseforge_core::domain::scene::Quaternion;
use caseforge_core::domain::scene::SceneObject;
use caseforge_core::domain::scene::UncertaintyRegion;
use caseforge_core::domain::scene::Vector3;
use caseforge_core::interfaces::clients::ReconstructInput;
use caseforge_core::interfaces::clients::ReconstructOutput;
use caseforge_core::interfaces::clients::ReconstructionClient;
use caseforge_core::ClientError;

use crate::common::deterministic_confidence;
use crate::common::FailureTriggers;

/// Deterministic [`ReconstructionClient`] mock.
pub struct MockReconstructionClient {
    triggers: FailureTriggers,
}

impl MockReconstructionClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// each scan asset key.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockReconstructionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconstructionClient for MockReconstructionClient {
    async fn reconstruct(&self, input: ReconstructInput) -> Result<ReconstructOutput, ClientError> {
        if input.scan_asset_keys.is_empty() {
            return Err(ClientError::InvalidInput("scan_asset_keys must be non-empty".to_string()));
        }
        for key in &input.scan_asset_keys {
            if let Some(error) = self.triggers.check(key) {
                return Err(error);
            }
        }

        let proposals: Vec<ObjectDelta> = input
            .scan_asset_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let offset = index as f64 * 1.5;
                ObjectDelta::Create(SceneObject {
                    id: ObjectId::generate(),
                    object_type: ObjectType::Other,
                    label: format!("reconstructed-object-{index}"),
                    pose: Pose { position: Vector3 { x: offset, y: 0.0, z: 0.0 }, rotation: Quaternion::IDENTITY },
                    bbox: Bbox::new(
                        Vector3 { x: offset - 0.25, y: -0.25, z: -0.25 },
                        Vector3 { x: offset + 0.25, y: 0.25, z: 0.25 },
                    ),
                    state: ObjectState::Detected,
                    confidence: deterministic_confidence(key, 0.6, 0.95),
                    source_commit_ids: Vec::new(),
                    evidence_ids: Vec::new(),
                    metadata: serde_json::json!({ "source_asset_key": key }),
                })
            })
            .collect();

        let stats = ProcessingStats {
            input_image_count: u32::try_from(input.scan_asset_keys.len()).unwrap_or(u32::MAX),
            detected_object_count: u32::try_from(proposals.len()).unwrap_or(u32::MAX),
            elapsed_ms: 800 + 50 * u64::try_from(input.scan_asset_keys.len()).unwrap_or(0),
        };

        Ok(ReconstructOutput {
            proposals,
            mesh_asset_key: Some(format!("reconstructions/{}/mesh.glb", input.case_id)),
            pointcloud_asset_key: Some(format!("reconstructions/{}/pointcloud.ply", input.case_id)),
            uncertainty_regions: vec![UncertaintyRegion {
                id: "region-0".to_string(),
                description: "periphery of the scanned volume".to_string(),
                bbox: None,
                confidence: 0.4,
            }],
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;

    use super::*;

    fn input(keys: Vec<&str>) -> ReconstructInput {
        ReconstructInput {
            case_id: CaseId::new("case-1"),
            scan_asset_keys: keys.into_iter().map(str::to_string).collect(),
            pov_asset_keys: Vec::new(),
            camera_poses: None,
            existing_scenegraph: None,
        }
    }

    #[tokio::test]
    async fn reconstruct_rejects_empty_scan_keys() {
        let client = MockReconstructionClient::new();
        let result = client.reconstruct(input(Vec::new())).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn reconstruct_produces_one_proposal_per_scan_key() {
        let client = MockReconstructionClient::new();
        let output = client.reconstruct(input(vec!["scan-1", "scan-2", "scan-3"])).await.expect("reconstruction succeeds");
        assert_eq!(output.proposals.len(), 3);
        assert_eq!(output.stats.input_image_count, 3);
    }

    #[tokio::test]
    async fn reconstruct_honors_failure_triggers() {
        let triggers = FailureTriggers::new().with_trigger("FORCE_UNAVAILABLE", ClientError::ModelUnavailable);
        let client = MockReconstructionClient::with_triggers(triggers);
        let result = client.reconstruct(input(vec!["scan-FORCE_UNAVAILABLE"])).await;
        assert!(matches!(result, Err(ClientError::ModelUnavailable)));
    }
}
