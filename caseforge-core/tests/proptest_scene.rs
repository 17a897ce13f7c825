// caseforge-core/tests/proptest_scene.rs
// ============================================================================
// Module: Scene Graph Property-Based Tests
// Description: Property tests for SceneGraph round-tripping, bounds
//              invariants, and the diff/apply fold.
// Purpose: Exercise the confidence/bbox bounds and replay-commutes-with-diff
//          invariants across wide input ranges, not just hand-picked cases.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use caseforge_core::domain::identifiers::ObjectId;
use caseforge_core::domain::scene::Bbox;
use caseforge_core::domain::scene::ObjectState;
use caseforge_core::domain::scene::ObjectType;
use caseforge_core::domain::scene::Pose;
use caseforge_core::domain::scene::Quaternion;
use caseforge_core::domain::scene::SceneGraph;
use caseforge_core::domain::scene::SceneObject;
use caseforge_core::domain::scene::Vector3;
use proptest::prelude::*;

fn finite_coordinate() -> impl Strategy<Value = f64> {
    -1_000.0..1_000.0
}

fn vector3_strategy() -> impl Strategy<Value = Vector3> {
    (finite_coordinate(), finite_coordinate(), finite_coordinate()).prop_map(|(x, y, z)| Vector3 { x, y, z })
}

fn bbox_strategy() -> impl Strategy<Value = Bbox> {
    (vector3_strategy(), vector3_strategy()).prop_map(|(a, b)| Bbox::new(a, b))
}

fn object_type_strategy() -> impl Strategy<Value = ObjectType> {
    prop_oneof![
        Just(ObjectType::Furniture),
        Just(ObjectType::Door),
        Just(ObjectType::Window),
        Just(ObjectType::Wall),
        Just(ObjectType::EvidenceItem),
        Just(ObjectType::Weapon),
        Just(ObjectType::Footprint),
        Just(ObjectType::Bloodstain),
        Just(ObjectType::Vehicle),
        Just(ObjectType::PersonMarker),
        Just(ObjectType::Other),
    ]
}

fn scene_object_strategy(id: String) -> impl Strategy<Value = SceneObject> {
    (object_type_strategy(), bbox_strategy(), 0.0..=1.0f64).prop_map(move |(object_type, bbox, confidence)| SceneObject {
        id: ObjectId::new(id.clone()),
        object_type,
        label: id.clone(),
        pose: Pose { position: Vector3::ZERO, rotation: Quaternion::IDENTITY },
        bbox,
        state: ObjectState::Visible,
        confidence,
        source_commit_ids: Vec::new(),
        evidence_ids: Vec::new(),
        metadata: serde_json::Value::Null,
    })
}

fn scene_graph_strategy() -> impl Strategy<Value = SceneGraph> {
    (0usize..6).prop_flat_map(|count| {
        let object_strategies: Vec<_> = (0..count).map(|i| scene_object_strategy(format!("obj-{i}"))).collect();
        object_strategies.prop_map(|objects| {
            let mut graph = SceneGraph::empty();
            graph.objects = objects;
            graph.recompute_bounds();
            graph
        })
    })
}

proptest! {
    /// A scene graph built from arbitrary in-range objects always satisfies
    /// the confidence-in-`[0, 1]` and bbox-validity invariants after
    /// `recompute_bounds`.
    #[test]
    fn scene_graph_confidence_and_bbox_bounds_hold(graph in scene_graph_strategy()) {
        prop_assert!(graph.is_valid());
    }

    /// Serializing and deserializing a scene graph is lossless for any
    /// arbitrary in-range graph, not just the empty one.
    #[test]
    fn scene_graph_round_trips_through_json(graph in scene_graph_strategy()) {
        let json = serde_json::to_string(&graph).expect("scene graph serializes");
        let back: SceneGraph = serde_json::from_str(&json).expect("scene graph deserializes");
        prop_assert_eq!(graph, back);
    }

    /// Diffing two arbitrary graphs and replaying the diff onto the first
    /// always reconstructs the second: the fold commutes with the diff.
    #[test]
    fn replay_commutes_with_diff(a in scene_graph_strategy(), b in scene_graph_strategy()) {
        let diff = a.diff_against(&b);
        let mut replayed = a.clone();
        replayed.apply_diff(&diff);
        prop_assert_eq!(replayed, b);
    }
}
