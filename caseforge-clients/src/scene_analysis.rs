// caseforge-clients/src/scene_analysis.rs
// ============================================================================
// Module: Mock Scene Analysis Client
// Description: Deterministic stand-in for an object-detection/evidence-
//              search vendor.
// Purpose: Implement SceneAnalysisClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

use async_trait::async_trait;
use caseforge_core::domain::identifiers::ObjectId;
use caseforge_core::domain::scene::ObjectType;
use caseforge_core::interfaces::clients::DetectedObject;
use caseforge_core::interfaces::clients::SceneAnalysisInput;
use caseforge_core::interfaces::clients::SceneAnalysisMode;
use caseforge_core::interfaces::clients::SceneAnalysisOutput;
use caseforge_core::interfaces::clients::SceneAnalysisClient;
use caseforge_core::ClientError;

use crate::common::deterministic_confidence;
use crate::common::FailureTriggers;

/// Deterministic [`SceneAnalysisClient`] mock.
pub struct MockSceneAnalysisClient {
    triggers: FailureTriggers,
}

impl MockSceneAnalysisClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// the input's optional free-text query.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockSceneAnalysisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SceneAnalysisClient for MockSceneAnalysisClient {
    async fn analyze_scene(&self, input: SceneAnalysisInput) -> Result<SceneAnalysisOutput, ClientError> {
        if input.image_keys.is_empty() {
            return Err(ClientError::InvalidInput("image_keys must be non-empty".to_string()));
        }
        if let Some(query) = &input.query {
            if let Some(error) = self.triggers.check(query) {
                return Err(error);
            }
        }

        let detect_objects = matches!(input.mode, SceneAnalysisMode::ObjectDetection | SceneAnalysisMode::FullAnalysis);
        let search_evidence = matches!(input.mode, SceneAnalysisMode::EvidenceSearch | SceneAnalysisMode::FullAnalysis);

        let detected_objects = if detect_objects {
            input
                .image_keys
                .iter()
                .enumerate()
                .map(|(index, key)| DetectedObject {
                    id: ObjectId::generate(),
                    object_type: ObjectType::Other,
                    label: format!("detected-object-{index}"),
                    position_description: "center of frame".to_string(),
                    confidence: deterministic_confidence(key, 0.55, 0.9),
                    is_suspicious: false,
                    notes: String::new(),
                    source_image_key: key.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let potential_evidence = if search_evidence {
            input.image_keys.iter().map(|key| format!("possible evidence near {key}")).collect()
        } else {
            Vec::new()
        };

        Ok(SceneAnalysisOutput {
            detected_objects,
            potential_evidence,
            scene_description: format!("analyzed {} image(s)", input.image_keys.len()),
            anomalies: Vec::new(),
            model_used: "mock-scene-analysis-v1".to_string(),
            elapsed_ms: 300 + 40 * u64::try_from(input.image_keys.len()).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;

    use super::*;

    fn input(mode: SceneAnalysisMode, keys: Vec<&str>) -> SceneAnalysisInput {
        SceneAnalysisInput { case_id: CaseId::new("case-1"), image_keys: keys.into_iter().map(str::to_string).collect(), mode, query: None }
    }

    #[tokio::test]
    async fn analyze_scene_rejects_empty_image_keys() {
        let client = MockSceneAnalysisClient::new();
        let result = client.analyze_scene(input(SceneAnalysisMode::FullAnalysis, Vec::new())).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn object_detection_mode_skips_evidence_search() {
        let client = MockSceneAnalysisClient::new();
        let output = client.analyze_scene(input(SceneAnalysisMode::ObjectDetection, vec!["img-1"])).await.expect("analysis succeeds");
        assert_eq!(output.detected_objects.len(), 1);
        assert!(output.potential_evidence.is_empty());
    }

    #[tokio::test]
    async fn evidence_search_mode_skips_object_detection() {
        let client = MockSceneAnalysisClient::new();
        let output = client.analyze_scene(input(SceneAnalysisMode::EvidenceSearch, vec!["img-1", "img-2"])).await.expect("analysis succeeds");
        assert!(output.detected_objects.is_empty());
        assert_eq!(output.potential_evidence.len(), 2);
    }

    #[tokio::test]
    async fn full_analysis_mode_runs_both() {
        let client = MockSceneAnalysisClient::new();
        let output = client.analyze_scene(input(SceneAnalysisMode::FullAnalysis, vec!["img-1"])).await.expect("analysis succeeds");
        assert_eq!(output.detected_objects.len(), 1);
        assert_eq!(output.potential_evidence.len(), 1);
    }
}
