// caseforge-clients/src/reasoning.rs
// ============================================================================
// Module: Mock Reasoning Client
// Description: Deterministic stand-in for an LLM reasoning vendor.
// Purpose: Implement ReasoningClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

//! ## Overview
//! Produces up to `max_trajectories` single-segment trajectories, one per
//! scene object (falling back to a single empty-scene trajectory when the
//! scene has none), each walking from the scene origin to the object's
//! position.

use async_trait::async_trait;
use caseforge_core::domain::commit::ModelStats;
use caseforge_core::domain::commit::NextStepSuggestion;
use caseforge_core::domain::commit::Trajectory;
use caseforge_core::domain::commit::TrajectorySegment;
use caseforge_core::domain::scene::Vector3;
use caseforge_core::interfaces::clients::ReasoningClient;
use caseforge_core::interfaces::clients::ReasoningInput;
use caseforge_core::interfaces::clients::ReasoningOutput;
use caseforge_core::ClientError;

use crate::common::deterministic_confidence;
use crate::common::FailureTriggers;

/// Deterministic [`ReasoningClient`] mock.
pub struct MockReasoningClient {
    triggers: FailureTriggers,
}

impl MockReasoningClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// each scene object's label.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockReasoningClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningClient for MockReasoningClient {
    async fn reason(&self, input: ReasoningInput) -> Result<ReasoningOutput, ClientError> {
        for object in &input.scenegraph.objects {
            if let Some(error) = self.triggers.check(&object.label) {
                return Err(error);
            }
        }

        let max_trajectories = usize::try_from(input.max_trajectories.max(1)).unwrap_or(usize::MAX);
        let objects: Vec<_> = input.scenegraph.objects.iter().take(max_trajectories).collect();

        let trajectories = if objects.is_empty() {
            vec![Trajectory {
                rank: 0,
                segments: vec![TrajectorySegment {
                    index: 0,
                    from: Vector3::ZERO,
                    to: Vector3::ZERO,
                    waypoints: Vec::new(),
                    time_estimate_s: 0.0,
                    evidence_refs: Vec::new(),
                    confidence: 0.3,
                    explanation: "no scene objects available to reason over".to_string(),
                }],
                confidence: 0.3,
            }]
        } else {
            objects
                .iter()
                .enumerate()
                .map(|(rank, object)| Trajectory {
                    rank: u32::try_from(rank).unwrap_or(u32::MAX),
                    segments: vec![TrajectorySegment {
                        index: 0,
                        from: Vector3::ZERO,
                        to: object.pose.position,
                        waypoints: Vec::new(),
                        time_estimate_s: 2.0,
                        evidence_refs: Vec::new(),
                        confidence: deterministic_confidence(object.label.as_str(), 0.5, 0.9),
                        explanation: format!("moves toward {}", object.label),
                    }],
                    confidence: deterministic_confidence(object.label.as_str(), 0.5, 0.9),
                })
                .collect()
        };

        let model_stats = ModelStats {
            model_used: "mock-reasoning-v1".to_string(),
            elapsed_ms: 500,
            thinking_tokens_used: Some(input.thinking_budget.min(caseforge_core::interfaces::clients::MAX_THINKING_BUDGET)),
        };

        Ok(ReasoningOutput {
            trajectories,
            uncertainty_areas: input.scenegraph.uncertainty_regions.iter().map(|region| region.description.clone()).collect(),
            next_steps: vec![NextStepSuggestion {
                suggestion_type: "scene_analysis".to_string(),
                description: "capture additional imagery of unexplored areas".to_string(),
                priority: 1,
            }],
            thinking_summary: "evaluated each known scene object as a candidate trajectory endpoint".to_string(),
            model_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;
    use caseforge_core::domain::scene::SceneGraph;

    use super::*;

    fn input(scenegraph: SceneGraph) -> ReasoningInput {
        ReasoningInput {
            case_id: CaseId::new("case-1"),
            scenegraph,
            branch_id: None,
            constraint_overrides: None,
            thinking_budget: 4096,
            max_trajectories: 3,
        }
    }

    #[tokio::test]
    async fn reason_over_an_empty_scene_returns_one_placeholder_trajectory() {
        let client = MockReasoningClient::new();
        let output = client.reason(input(SceneGraph::empty())).await.expect("reasoning succeeds");
        assert_eq!(output.trajectories.len(), 1);
    }

    #[tokio::test]
    async fn reason_caps_trajectories_at_max_trajectories() {
        let client = MockReasoningClient::new();
        let mut scenegraph = SceneGraph::empty();
        for index in 0..5 {
            scenegraph.objects.push(caseforge_core::domain::scene::SceneObject {
                id: caseforge_core::domain::identifiers::ObjectId::new(format!("obj-{index}")),
                object_type: caseforge_core::domain::scene::ObjectType::Other,
                label: format!("object-{index}"),
                pose: caseforge_core::domain::scene::Pose {
                    position: Vector3 { x: f64::from(index), y: 0.0, z: 0.0 },
                    rotation: caseforge_core::domain::scene::Quaternion::IDENTITY,
                },
                bbox: caseforge_core::domain::scene::Bbox::new(Vector3::ZERO, Vector3::ZERO),
                state: caseforge_core::domain::scene::ObjectState::Visible,
                confidence: 0.9,
                source_commit_ids: Vec::new(),
                evidence_ids: Vec::new(),
                metadata: serde_json::Value::Null,
            });
        }
        let output = client.reason(input(scenegraph)).await.expect("reasoning succeeds");
        assert_eq!(output.trajectories.len(), 3);
    }
}
