// caseforge-clients/src/asset3d.rs
// ============================================================================
// Module: Mock 3D Asset Client
// Description: Deterministic stand-in for a 3D-asset-synthesis vendor.
// Purpose: Implement Asset3DClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

use async_trait::async_trait;
use caseforge_core::interfaces::clients::Asset3DClient;
use caseforge_core::interfaces::clients::Asset3DInput;
use caseforge_core::interfaces::clients::Asset3DOutput;
use caseforge_core::ClientError;

use crate::common::FailureTriggers;

/// Deterministic [`Asset3DClient`] mock.
pub struct MockAsset3DClient {
    triggers: FailureTriggers,
}

impl MockAsset3DClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// the item's description.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockAsset3DClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Asset3DClient for MockAsset3DClient {
    async fn generate_3d_asset(&self, input: Asset3DInput) -> Result<Asset3DOutput, ClientError> {
        if input.item_type.is_empty() {
            return Err(ClientError::InvalidInput("item_type must be non-empty".to_string()));
        }
        if let Some(error) = self.triggers.check(&input.description) {
            return Err(error);
        }

        Ok(Asset3DOutput {
            mesh_asset_key: format!("assets3d/{}/{}.{}", input.case_id, input.item_type, input.output_format),
            thumbnail_asset_key: Some(format!("assets3d/{}/{}_thumb.png", input.case_id, input.item_type)),
            format: input.output_format,
            has_texture: input.with_texture,
            vertex_count: Some(4200),
            model_used: "mock-asset3d-v1".to_string(),
            generation_time_ms: 2500,
        })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;

    use super::*;

    fn input(item_type: &str) -> Asset3DInput {
        Asset3DInput {
            case_id: CaseId::new("case-1"),
            reference_image_key: "ref.png".to_string(),
            item_type: item_type.to_string(),
            description: "a folding knife".to_string(),
            with_texture: true,
            output_format: "glb".to_string(),
        }
    }

    #[tokio::test]
    async fn generate_3d_asset_rejects_empty_item_type() {
        let client = MockAsset3DClient::new();
        let result = client.generate_3d_asset(input("")).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn generate_3d_asset_reports_requested_texture_flag() {
        let client = MockAsset3DClient::new();
        let output = client.generate_3d_asset(input("knife")).await.expect("generation succeeds");
        assert!(output.has_texture);
        assert_eq!(output.format, "glb");
    }
}
