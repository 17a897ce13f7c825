// caseforge-clients/src/registry.rs
// ============================================================================
// Module: Client Registry
// Description: Wires one implementation per AI-client trait for worker
//              pipeline construction.
// Purpose: Give the CLI a single place to assemble the client set a worker
//          needs, independent of which implementation backs each trait.
// Dependencies: caseforge-core
// ============================================================================

//! ## Overview
//! Unlike a provider registry keyed by a single homogeneous trait, the
//! eight AI-client interfaces are distinct traits with distinct request
//! and response shapes, so this registry is a plain struct of named
//! slots rather than a `BTreeMap`. Each slot is independently
//! replaceable, which is what lets a future vendor-backed client drop
//! in beside the mocks used today.

use std::sync::Arc;

use caseforge_core::interfaces::clients::Asset3DClient;
use caseforge_core::interfaces::clients::ImageGenClient;
use caseforge_core::interfaces::clients::ProfileClient;
use caseforge_core::interfaces::clients::ReasoningClient;
use caseforge_core::interfaces::clients::ReconstructionClient;
use caseforge_core::interfaces::clients::ReplayClient;
use caseforge_core::interfaces::clients::SceneAnalysisClient;
use caseforge_core::interfaces::clients::StorageClient;

use crate::asset3d::MockAsset3DClient;
use crate::imagegen::MockImageGenClient;
use crate::profile::MockProfileClient;
use crate::reasoning::MockReasoningClient;
use crate::reconstruction::MockReconstructionClient;
use crate::replay::MockReplayClient;
use crate::scene_analysis::MockSceneAnalysisClient;
use crate::storage::MockStorageClient;

/// Named set of AI-client and storage-client implementations.
///
/// Each field is independently constructed and swappable; nothing here
/// assumes all eight slots share one vendor.
pub struct ClientRegistry {
    /// Scan-to-mesh reconstruction client.
    pub reconstruction: Arc<dyn ReconstructionClient>,
    /// Object-detection and evidence-search client.
    pub scene_analysis: Arc<dyn SceneAnalysisClient>,
    /// Trajectory reasoning client.
    pub reasoning: Arc<dyn ReasoningClient>,
    /// Witness-statement attribute extraction client.
    pub profile: Arc<dyn ProfileClient>,
    /// Image generation client.
    pub imagegen: Arc<dyn ImageGenClient>,
    /// 3D asset generation client.
    pub asset3d: Arc<dyn Asset3DClient>,
    /// Replay video generation client.
    pub replay: Arc<dyn ReplayClient>,
    /// Binary object storage client.
    pub storage: Arc<dyn StorageClient>,
}

impl ClientRegistry {
    /// Builds a registry backed entirely by the deterministic mock clients
    /// in this crate, each with no forced failures.
    #[must_use]
    pub fn with_mock_clients() -> Self {
        Self {
            reconstruction: Arc::new(MockReconstructionClient::new()),
            scene_analysis: Arc::new(MockSceneAnalysisClient::new()),
            reasoning: Arc::new(MockReasoningClient::new()),
            profile: Arc::new(MockProfileClient::new()),
            imagegen: Arc::new(MockImageGenClient::new()),
            asset3d: Arc::new(MockAsset3DClient::new()),
            replay: Arc::new(MockReplayClient::new()),
            storage: Arc::new(MockStorageClient::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_mock_clients_populates_every_slot() {
        let registry = ClientRegistry::with_mock_clients();
        assert!(Arc::strong_count(&registry.reconstruction) >= 1);
        assert!(Arc::strong_count(&registry.storage) >= 1);
    }
}
