// caseforge-core/src/domain/asset.rs
// ============================================================================
// Module: Asset
// Description: Pointers to binary artifacts stored outside the database.
// Purpose: Define Asset and AssetKind.
// Dependencies: serde, time
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::AssetId;
use crate::domain::identifiers::CaseId;

/// The kind of binary artifact an asset points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A raw uploaded scan image.
    ScanImage,
    /// An image produced by image generation.
    GeneratedImage,
    /// A 3D mesh.
    Mesh,
    /// A point cloud.
    Pointcloud,
    /// A generated suspect portrait.
    Portrait,
    /// A rendered case report.
    Report,
    /// A generated replay video.
    ReplayVideo,
    /// A 3D evidence model.
    EvidenceModel,
}

/// A pointer to a binary artifact stored in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Opaque unique identifier.
    pub id: AssetId,
    /// The case this asset belongs to.
    pub case_id: CaseId,
    /// The kind of artifact this asset points to.
    pub kind: AssetKind,
    /// Opaque storage key, unique globally, content-addressed by the store.
    pub storage_key: String,
    /// Free-form metadata (dimensions, model used, generation time, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}
