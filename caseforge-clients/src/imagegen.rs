// caseforge-clients/src/imagegen.rs
// ============================================================================
// Module: Mock Image Generation Client
// Description: Deterministic stand-in for an image-generation vendor.
// Purpose: Implement ImageGenClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

//! ## Overview
//! For `scene_pov`, reads a `view_angles` array out of the opaque payload
//! and renders one image per angle (falling back to a single `"default"`
//! angle when absent); at least one image is always produced, matching
//! [`ImageGenOutput`]'s documented invariant.

use async_trait::async_trait;
use caseforge_core::interfaces::clients::GenType;
use caseforge_core::interfaces::clients::GeneratedImage;
use caseforge_core::interfaces::clients::ImageGenClient;
use caseforge_core::interfaces::clients::ImageGenInput;
use caseforge_core::interfaces::clients::ImageGenOutput;
use caseforge_core::interfaces::clients::Resolution;
use caseforge_core::ClientError;

use crate::common::FailureTriggers;

/// Deterministic [`ImageGenClient`] mock.
pub struct MockImageGenClient {
    triggers: FailureTriggers,
}

impl MockImageGenClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// the input payload's serialized form.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockImageGenClient {
    fn default() -> Self {
        Self::new()
    }
}

fn resolution_pixels(resolution: Resolution) -> (u32, u32) {
    match resolution {
        Resolution::R1k => (1024, 1024),
        Resolution::R2k => (2048, 2048),
        Resolution::R4k => (4096, 4096),
    }
}

fn gen_type_label(gen_type: GenType) -> &'static str {
    match gen_type {
        GenType::Portrait => "portrait",
        GenType::EvidenceBoard => "evidence-board",
        GenType::Comparison => "comparison",
        GenType::ReportFigure => "report-figure",
        GenType::ScenePov => "scene-pov",
        GenType::AssetClean => "asset-clean",
    }
}

#[async_trait]
impl ImageGenClient for MockImageGenClient {
    async fn generate(&self, input: ImageGenInput) -> Result<ImageGenOutput, ClientError> {
        if let Some(error) = self.triggers.check(&input.payload.to_string()) {
            return Err(error);
        }

        let (width, height) = resolution_pixels(input.resolution);
        let label = gen_type_label(input.gen_type);

        let view_angles: Vec<String> = if matches!(input.gen_type, GenType::ScenePov) {
            input
                .payload
                .get("view_angles")
                .and_then(serde_json::Value::as_array)
                .map(|angles| angles.iter().filter_map(|a| a.as_str().map(str::to_string)).collect())
                .filter(|angles: &Vec<String>| !angles.is_empty())
                .unwrap_or_else(|| vec!["default".to_string()])
        } else {
            vec!["default".to_string()]
        };

        let images = view_angles
            .into_iter()
            .enumerate()
            .map(|(index, angle)| GeneratedImage {
                view_angle: matches!(input.gen_type, GenType::ScenePov).then_some(angle.clone()),
                asset_key: format!("generated/{}/{label}-{index}.png", input.case_id),
                thumbnail_key: format!("generated/{}/{label}-{index}_thumb.png", input.case_id),
                width,
                height,
            })
            .collect();

        Ok(ImageGenOutput { images, model_used: "mock-imagegen-v1".to_string(), generation_time_ms: 1200, cost_estimate: Some(0.02) })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;

    use super::*;

    fn input(gen_type: GenType, payload: serde_json::Value) -> ImageGenInput {
        ImageGenInput { case_id: CaseId::new("case-1"), gen_type, resolution: Resolution::R1k, payload }
    }

    #[tokio::test]
    async fn generate_produces_one_image_for_non_scene_pov() {
        let client = MockImageGenClient::new();
        let output = client.generate(input(GenType::Portrait, serde_json::json!({}))).await.expect("generation succeeds");
        assert_eq!(output.images.len(), 1);
        assert!(output.images[0].view_angle.is_none());
    }

    #[tokio::test]
    async fn generate_produces_one_image_per_view_angle() {
        let client = MockImageGenClient::new();
        let output = client
            .generate(input(GenType::ScenePov, serde_json::json!({ "view_angles": ["north", "south", "east"] })))
            .await
            .expect("generation succeeds");
        assert_eq!(output.images.len(), 3);
        assert_eq!(output.images[0].view_angle.as_deref(), Some("north"));
    }

    #[tokio::test]
    async fn generate_falls_back_to_default_angle_when_payload_has_none() {
        let client = MockImageGenClient::new();
        let output = client.generate(input(GenType::ScenePov, serde_json::json!({}))).await.expect("generation succeeds");
        assert_eq!(output.images.len(), 1);
    }
}
