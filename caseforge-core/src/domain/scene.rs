// caseforge-core/src/domain/scene.rs
// ============================================================================
// Module: Scene Graph
// Description: The structured world-model state materialized for a case.
// Purpose: Define SceneGraph and its nested types, plus the diff shape used
//          to fold commit payloads into a new snapshot.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`SceneGraph`] is the current-state world model for a case: objects,
//! evidence cards, constraints, and optional uncertainty regions and
//! point-cloud references. It is never hand-edited in place; it is always
//! produced by folding a [`SceneGraphDiff`] onto a prior graph (see
//! `caseforge-core::commitlog`).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::identifiers::CommitId;
use crate::domain::identifiers::ObjectId;

/// Current schema version written for new scene graphs.
pub const SCENE_GRAPH_SCHEMA_VERSION: u16 = 1;

/// Minimum footprint enforced when recomputing scene bounds.
pub const MIN_FOOTPRINT_METERS: f64 = 8.0;

/// Minimum ceiling height enforced when recomputing scene bounds.
pub const MIN_CEILING_METERS: f64 = 3.0;

/// Margin added around observed objects when recomputing scene bounds.
pub const BOUNDS_MARGIN_METERS: f64 = 2.0;

/// A 3-component vector in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Elementwise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    /// Elementwise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }
}

/// A unit quaternion describing object orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// W (scalar) component.
    pub w: f64,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
}

/// Position and orientation of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters.
    pub position: Vector3,
    /// Orientation.
    pub rotation: Quaternion,
}

/// An axis-aligned bounding box.
///
/// # Invariants
/// `min` is elementwise less than or equal to `max`; construction through
/// [`Bbox::new`] enforces this, but deserialization does not — callers that
/// read untrusted payloads should call [`Bbox::is_valid`] before relying on
/// the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    /// Minimum corner.
    pub min: Vector3,
    /// Maximum corner.
    pub max: Vector3,
}

impl Bbox {
    /// Constructs a bbox, swapping corners if necessary so `min <= max`.
    #[must_use]
    pub fn new(min: Vector3, max: Vector3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Returns whether `min <= max` holds elementwise.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// The union of two bounding boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Expands the box outward by `margin` meters on every side.
    #[must_use]
    pub fn expand(self, margin: f64) -> Self {
        let delta = Vector3 { x: margin, y: margin, z: margin };
        Self {
            min: Vector3 { x: self.min.x - delta.x, y: self.min.y - delta.y, z: self.min.z - delta.z },
            max: Vector3 { x: self.max.x + delta.x, y: self.max.y + delta.y, z: self.max.z + delta.z },
        }
    }

    /// Clamps the box to at least `footprint` meters in X/Y and `ceiling`
    /// meters in Z, expanding symmetrically around the existing center.
    #[must_use]
    pub fn clamp_minimum(self, footprint: f64, ceiling: f64) -> Self {
        let widen = |min: f64, max: f64, minimum: f64| -> (f64, f64) {
            let size = max - min;
            if size >= minimum {
                return (min, max);
            }
            let center = (min + max) / 2.0;
            (center - minimum / 2.0, center + minimum / 2.0)
        };
        let (min_x, max_x) = widen(self.min.x, self.max.x, footprint);
        let (min_y, max_y) = widen(self.min.y, self.max.y, footprint);
        let (min_z, max_z) = widen(self.min.z, self.max.z, ceiling);
        Self {
            min: Vector3 { x: min_x, y: min_y, z: min_z },
            max: Vector3 { x: max_x, y: max_y, z: max_z },
        }
    }
}

/// The category of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// General furniture.
    Furniture,
    /// A door.
    Door,
    /// A window.
    Window,
    /// A wall segment.
    Wall,
    /// A tagged item of evidence.
    EvidenceItem,
    /// A weapon.
    Weapon,
    /// A footprint.
    Footprint,
    /// A bloodstain.
    Bloodstain,
    /// A vehicle.
    Vehicle,
    /// A marker denoting a person's position.
    PersonMarker,
    /// Anything not covered by the above.
    Other,
}

/// The observational state of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// Currently visible and unremarkable.
    Visible,
    /// Occluded from direct observation.
    Occluded,
    /// Flagged as suspicious.
    Suspicious,
    /// Removed from the scene (e.g. by a later edit).
    Removed,
    /// Freshly detected, not yet reviewed.
    Detected,
}

/// A single object placed within the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Stable identifier, unique within the case.
    pub id: ObjectId,
    /// Object category.
    pub object_type: ObjectType,
    /// Human-readable label.
    pub label: String,
    /// Position and orientation.
    pub pose: Pose,
    /// Axis-aligned bounding box.
    pub bbox: Bbox,
    /// Observational state.
    pub state: ObjectState,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Commits that contributed to this object's current state.
    pub source_commit_ids: Vec<CommitId>,
    /// Evidence cards referencing this object.
    pub evidence_ids: Vec<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SceneObject {
    /// Returns whether `confidence` lies in `[0, 1]` and `bbox` is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence) && self.bbox.is_valid()
    }
}

/// The provenance tag on an evidence source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSourceKind {
    /// Derived from an uploaded scan or image.
    Upload,
    /// Derived from a witness statement.
    Witness,
    /// Derived from model inference (reconstruction, scene analysis, reasoning).
    Inference,
}

/// A single contributing source behind an evidence card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSource {
    /// What kind of source this is.
    pub kind: EvidenceSourceKind,
    /// The commit that introduced this source.
    pub commit_id: CommitId,
    /// Credibility in `[0, 1]`; only meaningful for witness sources.
    pub credibility: Option<f64>,
}

/// A card describing a piece of evidence and the objects it relates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCard {
    /// Stable identifier, unique within the case.
    pub id: String,
    /// Objects this evidence pertains to.
    pub object_ids: Vec<ObjectId>,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Contributing sources.
    pub sources: Vec<EvidenceSource>,
    /// Sources that contradict this card, if any were detected.
    pub conflicting_sources: Option<Vec<EvidenceSource>>,
}

/// The kind of a scene constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// A door can only open in one direction.
    DoorDirection,
    /// A region that must remain passable.
    PassableArea,
    /// A permissible height range for an object class.
    HeightRange,
    /// A window of time during which an event is possible.
    TimeWindow,
    /// Anything not covered by the above.
    Custom,
}

/// A constraint narrowing the space of plausible reconstructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Stable identifier, unique within the case.
    pub id: String,
    /// Constraint category.
    pub constraint_type: ConstraintType,
    /// Human-readable description.
    pub description: String,
    /// Type-specific parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A region of the scene graph flagged as uncertain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyRegion {
    /// Stable identifier, unique within the case.
    pub id: String,
    /// Human-readable description of the uncertainty.
    pub description: String,
    /// The affected region, if spatially bounded.
    pub bbox: Option<Bbox>,
    /// Confidence that the region is accurately modeled, in `[0, 1]`.
    pub confidence: f64,
}

/// The structured world-model state materialized for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneGraph {
    /// Schema version of this graph.
    pub schema_version: u16,
    /// Axis-aligned bounds of the scene.
    pub bounds: Bbox,
    /// Scene objects, keyed by id; order carries no meaning.
    pub objects: Vec<SceneObject>,
    /// Evidence cards, keyed by id; order carries no meaning.
    pub evidence_cards: Vec<EvidenceCard>,
    /// Constraints, keyed by id; order carries no meaning.
    pub constraints: Vec<Constraint>,
    /// Optional uncertainty regions, keyed by id; order carries no meaning.
    pub uncertainty_regions: Vec<UncertaintyRegion>,
    /// Optional reference to a stored point-cloud asset.
    pub point_cloud_asset_key: Option<String>,
    /// Optional reference to a stored gaussian-splat asset.
    pub gaussian_asset_key: Option<String>,
}

impl SceneGraph {
    /// An empty scene graph at the current schema version, with a
    /// minimum-sized bounding box.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: SCENE_GRAPH_SCHEMA_VERSION,
            bounds: Bbox::new(Vector3::ZERO, Vector3::ZERO)
                .clamp_minimum(MIN_FOOTPRINT_METERS, MIN_CEILING_METERS),
            objects: Vec::new(),
            evidence_cards: Vec::new(),
            constraints: Vec::new(),
            uncertainty_regions: Vec::new(),
            point_cloud_asset_key: None,
            gaussian_asset_key: None,
        }
    }

    /// Returns the object with the given id, if present.
    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| &o.id == id)
    }

    /// Indexes objects by id for O(1) lookups during a fold.
    #[must_use]
    pub fn objects_by_id(&self) -> BTreeMap<ObjectId, &SceneObject> {
        self.objects.iter().map(|o| (o.id.clone(), o)).collect()
    }

    /// Recomputes [`Self::bounds`] from the current objects: the union of
    /// every object's bbox, expanded by [`BOUNDS_MARGIN_METERS`] and
    /// clamped to at least [`MIN_FOOTPRINT_METERS`] by [`MIN_CEILING_METERS`].
    pub fn recompute_bounds(&mut self) {
        let union = self
            .objects
            .iter()
            .map(|o| o.bbox)
            .reduce(Bbox::union)
            .unwrap_or_else(|| Bbox::new(Vector3::ZERO, Vector3::ZERO));
        self.bounds = union
            .expand(BOUNDS_MARGIN_METERS)
            .clamp_minimum(MIN_FOOTPRINT_METERS, MIN_CEILING_METERS);
    }

    /// Returns whether every confidence value in this graph lies in
    /// `[0, 1]` and every bbox is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.bounds.is_valid()
            && self.objects.iter().all(SceneObject::is_valid)
            && self
                .evidence_cards
                .iter()
                .all(|e| (0.0..=1.0).contains(&e.confidence))
            && self
                .constraints
                .iter()
                .all(|c| (0.0..=1.0).contains(&c.confidence))
    }
}

/// A single change to a scene object, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ObjectDelta {
    /// Introduces a new object.
    Create(SceneObject),
    /// Replaces an existing object's full value.
    Update(SceneObject),
    /// Deletes an object by id.
    Remove {
        /// The object to remove.
        id: ObjectId,
    },
}

/// A single change to an evidence card, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EvidenceDelta {
    /// Introduces a new evidence card.
    Create(EvidenceCard),
    /// Replaces an existing evidence card's full value.
    Update(EvidenceCard),
    /// Deletes an evidence card by id.
    Remove {
        /// The evidence card to remove.
        id: String,
    },
}

/// The change a single commit contributes to a case's scene graph.
///
/// Constraints and uncertainty regions are replaced wholesale by the
/// authoring worker when present, never diffed field-by-field — this is a
/// deliberate simplification pinned by tests, not an oversight.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneGraphDiff {
    /// Per-object changes.
    #[serde(default)]
    pub objects: Vec<ObjectDelta>,
    /// Per-evidence-card changes.
    #[serde(default)]
    pub evidence: Vec<EvidenceDelta>,
    /// Wholesale replacement of the constraint list, if this commit touches it.
    #[serde(default)]
    pub constraints: Option<Vec<Constraint>>,
    /// Wholesale replacement of the uncertainty-region list, if this commit
    /// touches it.
    #[serde(default)]
    pub uncertainty_regions: Option<Vec<UncertaintyRegion>>,
    /// Replacement point-cloud asset key, if this commit sets one.
    #[serde(default)]
    pub point_cloud_asset_key: Option<String>,
    /// Replacement gaussian-splat asset key, if this commit sets one.
    #[serde(default)]
    pub gaussian_asset_key: Option<String>,
}

impl SceneGraphDiff {
    /// Returns whether this diff changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.evidence.is_empty()
            && self.constraints.is_none()
            && self.uncertainty_regions.is_none()
            && self.point_cloud_asset_key.is_none()
            && self.gaussian_asset_key.is_none()
    }
}

impl SceneGraph {
    /// Applies a diff to this graph in place, then recomputes bounds.
    ///
    /// Object and evidence deltas are applied by id: `Create`/`Update` both
    /// upsert (the distinction exists for caller intent, not for merge
    /// semantics), `Remove` deletes the matching key if present.
    pub fn apply_diff(&mut self, diff: &SceneGraphDiff) {
        for delta in &diff.objects {
            match delta {
                ObjectDelta::Create(obj) | ObjectDelta::Update(obj) => {
                    self.objects.retain(|o| o.id != obj.id);
                    self.objects.push(obj.clone());
                }
                ObjectDelta::Remove { id } => {
                    self.objects.retain(|o| &o.id != id);
                }
            }
        }
        for delta in &diff.evidence {
            match delta {
                EvidenceDelta::Create(card) | EvidenceDelta::Update(card) => {
                    self.evidence_cards.retain(|e| e.id != card.id);
                    self.evidence_cards.push(card.clone());
                }
                EvidenceDelta::Remove { id } => {
                    self.evidence_cards.retain(|e| &e.id != id);
                }
            }
        }
        if let Some(constraints) = &diff.constraints {
            self.constraints = constraints.clone();
        }
        if let Some(regions) = &diff.uncertainty_regions {
            self.uncertainty_regions = regions.clone();
        }
        if let Some(key) = &diff.point_cloud_asset_key {
            self.point_cloud_asset_key = Some(key.clone());
        }
        if let Some(key) = &diff.gaussian_asset_key {
            self.gaussian_asset_key = Some(key.clone());
        }
        self.recompute_bounds();
    }

    /// Computes the diff that, applied to `self`, yields `other` — used by
    /// `GetCommitDiff`. Only objects and evidence cards are diffed;
    /// constraints and uncertainty regions are reported as a wholesale
    /// replacement whenever they differ, mirroring how they are written.
    #[must_use]
    pub fn diff_against(&self, other: &Self) -> SceneGraphDiff {
        let before = self.objects_by_id();
        let after = other.objects_by_id();
        let mut objects = Vec::new();
        for (id, obj) in &after {
            match before.get(id) {
                Some(prev) if *prev == *obj => {}
                Some(_) => objects.push(ObjectDelta::Update((*obj).clone())),
                None => objects.push(ObjectDelta::Create((*obj).clone())),
            }
        }
        for id in before.keys() {
            if !after.contains_key(id) {
                objects.push(ObjectDelta::Remove { id: id.clone() });
            }
        }

        let before_ev: BTreeMap<&str, &EvidenceCard> =
            self.evidence_cards.iter().map(|e| (e.id.as_str(), e)).collect();
        let after_ev: BTreeMap<&str, &EvidenceCard> =
            other.evidence_cards.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut evidence = Vec::new();
        for (id, card) in &after_ev {
            match before_ev.get(id) {
                Some(prev) if *prev == *card => {}
                Some(_) => evidence.push(EvidenceDelta::Update((*card).clone())),
                None => evidence.push(EvidenceDelta::Create((*card).clone())),
            }
        }
        for id in before_ev.keys() {
            if !after_ev.contains_key(id) {
                evidence.push(EvidenceDelta::Remove { id: (*id).to_string() });
            }
        }

        SceneGraphDiff {
            objects,
            evidence,
            constraints: (self.constraints != other.constraints)
                .then(|| other.constraints.clone()),
            uncertainty_regions: (self.uncertainty_regions != other.uncertainty_regions)
                .then(|| other.uncertainty_regions.clone()),
            point_cloud_asset_key: (self.point_cloud_asset_key != other.point_cloud_asset_key)
                .then(|| other.point_cloud_asset_key.clone())
                .flatten(),
            gaussian_asset_key: (self.gaussian_asset_key != other.gaussian_asset_key)
                .then(|| other.gaussian_asset_key.clone())
                .flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_clamps_to_minimum_footprint() {
        let tiny = Bbox::new(Vector3::ZERO, Vector3 { x: 1.0, y: 1.0, z: 1.0 });
        let clamped = tiny.clamp_minimum(MIN_FOOTPRINT_METERS, MIN_CEILING_METERS);
        assert!(clamped.max.x - clamped.min.x >= MIN_FOOTPRINT_METERS);
        assert!(clamped.max.z - clamped.min.z >= MIN_CEILING_METERS);
    }

    #[test]
    fn empty_graph_round_trips_through_json() {
        let graph = SceneGraph::empty();
        let json = serde_json::to_string(&graph).unwrap();
        let back: SceneGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }

    #[test]
    fn recompute_bounds_expands_by_margin_and_clamps() {
        let mut graph = SceneGraph::empty();
        graph.objects.push(SceneObject {
            id: ObjectId::new("obj-1"),
            object_type: ObjectType::Door,
            label: "door".into(),
            pose: Pose { position: Vector3::ZERO, rotation: Quaternion::IDENTITY },
            bbox: Bbox::new(Vector3::ZERO, Vector3 { x: 1.0, y: 1.0, z: 2.0 }),
            state: ObjectState::Visible,
            confidence: 0.9,
            source_commit_ids: Vec::new(),
            evidence_ids: Vec::new(),
            metadata: serde_json::Value::Null,
        });
        graph.recompute_bounds();
        assert!(graph.is_valid());
        assert!(graph.bounds.max.x - graph.bounds.min.x >= MIN_FOOTPRINT_METERS);
    }

    fn sample_object(id: &str) -> SceneObject {
        SceneObject {
            id: ObjectId::new(id),
            object_type: ObjectType::Furniture,
            label: id.to_string(),
            pose: Pose { position: Vector3::ZERO, rotation: Quaternion::IDENTITY },
            bbox: Bbox::new(Vector3::ZERO, Vector3 { x: 0.5, y: 0.5, z: 0.5 }),
            state: ObjectState::Visible,
            confidence: 0.8,
            source_commit_ids: Vec::new(),
            evidence_ids: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn diff_against_then_apply_is_consistent() {
        let mut a = SceneGraph::empty();
        a.objects.push(sample_object("obj-1"));
        a.recompute_bounds();

        let mut b = a.clone();
        b.objects.push(sample_object("obj-2"));
        b.objects.retain(|o| o.id.as_str() != "obj-1");
        b.recompute_bounds();

        let diff = a.diff_against(&b);
        let mut replayed = a.clone();
        replayed.apply_diff(&diff);
        assert_eq!(replayed, b);
    }
}
