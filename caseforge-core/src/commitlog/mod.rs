// caseforge-core/src/commitlog/mod.rs
// ============================================================================
// Module: Commit Log
// Description: Pure, deterministic folding of a case's append-only commit
//              chain into a materialized SceneGraph.
// Purpose: Implement the I-Chain / I-Snapshot invariants and the
//          ReplayToCommit / GetCommitDiff contracts independent of storage.
// Dependencies: none beyond the domain model
// ============================================================================

//! ## Overview
//! Replay is defined as: start with an empty [`SceneGraph`], then in commit
//! order (oldest ancestor to target) apply each commit's diff. This module
//! contains only that pure fold — persistence stores call into it, it never
//! calls back into them.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::commit::Commit;
use crate::domain::identifiers::CommitId;
use crate::domain::scene::SceneGraph;

/// An error encountered while walking or folding a commit chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitLogError {
    /// The requested commit id is not present in the supplied commit set.
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),
    /// A commit's `parent_commit_id` is not present in the supplied commit
    /// set — a broken chain (I-Chain violation).
    #[error("broken chain: commit {0} references missing parent")]
    BrokenChain(CommitId),
}

/// Resolves the ordered ancestor chain from a case's root commit up to and
/// including `target`, oldest first.
///
/// # Errors
/// Returns [`CommitLogError::CommitNotFound`] if `target` is absent from
/// `commits`, or [`CommitLogError::BrokenChain`] if a parent pointer does
/// not resolve within `commits`.
pub fn ancestor_chain<'a>(
    commits: &'a [Commit],
    target: &CommitId,
) -> Result<Vec<&'a Commit>, CommitLogError> {
    let by_id: HashMap<&CommitId, &Commit> = commits.iter().map(|c| (&c.id, c)).collect();
    let mut current = *by_id
        .get(target)
        .ok_or_else(|| CommitLogError::CommitNotFound(target.clone()))?;
    let mut chain = vec![current];
    while let Some(parent_id) = &current.parent_commit_id {
        current = by_id
            .get(parent_id)
            .ok_or_else(|| CommitLogError::BrokenChain(current.id.clone()))?;
        chain.push(current);
    }
    chain.reverse();
    Ok(chain)
}

/// Folds an oldest-first ancestor chain into a [`SceneGraph`] by applying
/// each commit's scene diff in order, starting from [`SceneGraph::empty`].
///
/// Pure and deterministic: the same chain always produces a byte-equal
/// graph (the snapshot-determinism invariant).
#[must_use]
pub fn fold(chain: &[&Commit]) -> SceneGraph {
    let mut graph = SceneGraph::empty();
    for commit in chain {
        if let Some(diff) = commit.payload.scene_diff() {
            graph.apply_diff(diff);
        }
    }
    graph
}

/// Reconstructs the SceneGraph at `target` by resolving and folding its
/// ancestor chain.
///
/// # Errors
/// See [`ancestor_chain`].
pub fn replay_to_commit(commits: &[Commit], target: &CommitId) -> Result<SceneGraph, CommitLogError> {
    let chain = ancestor_chain(commits, target)?;
    Ok(fold(&chain))
}

/// Returns the newest commit with `branch_id == None` — the case's main
/// head — or `None` if the case has no main-branch commits yet.
#[must_use]
pub fn main_head(commits: &[Commit]) -> Option<&Commit> {
    commits
        .iter()
        .filter(|c| c.branch_id.is_none())
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Returns the newest commit with `branch_id == Some(branch_id)` — or
/// `None` if the branch has no commits of its own yet (a fresh branch
/// replays from its `base_commit_id` instead).
#[must_use]
pub fn branch_head<'a>(commits: &'a [Commit], branch_id: &crate::domain::identifiers::BranchId) -> Option<&'a Commit> {
    commits
        .iter()
        .filter(|c| c.branch_id.as_ref() == Some(branch_id))
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Returns whether every commit in `commits` satisfies I-Chain: a parent,
/// if set, belongs to the same case and was created no later than its
/// child.
#[must_use]
pub fn chain_integrity_holds(commits: &[Commit]) -> bool {
    let by_id: HashMap<&CommitId, &Commit> = commits.iter().map(|c| (&c.id, c)).collect();
    commits.iter().all(|commit| match &commit.parent_commit_id {
        None => true,
        Some(parent_id) => match by_id.get(parent_id) {
            Some(parent) => parent.case_id == commit.case_id && parent.created_at <= commit.created_at,
            None => false,
        },
    })
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::commit::CommitPayload;
    use crate::domain::commit::EvidenceTier;
    use crate::domain::identifiers::CaseId;
    use crate::domain::scene::ObjectDelta;
    use crate::domain::scene::SceneGraphDiff;

    fn commit(id: &str, parent: Option<&str>, payload: CommitPayload, at: i64) -> Commit {
        Commit {
            id: CommitId::new(id),
            case_id: CaseId::new("case-1"),
            parent_commit_id: parent.map(CommitId::new),
            branch_id: None,
            payload,
            summary: "test".into(),
            created_at: OffsetDateTime::from_unix_timestamp(at).unwrap(),
            trace_id: None,
        }
    }

    fn upload(id: &str, parent: Option<&str>, at: i64) -> Commit {
        commit(
            id,
            parent,
            CommitPayload::UploadScan { asset_keys: vec!["k.jpg".into()], tier: EvidenceTier::GroundTruth },
            at,
        )
    }

    #[test]
    fn ancestor_chain_orders_oldest_first() {
        let commits = vec![upload("c1", None, 1), upload("c2", Some("c1"), 2), upload("c3", Some("c2"), 3)];
        let chain = ancestor_chain(&commits, &CommitId::new("c3")).unwrap();
        let ids: Vec<&str> = chain.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn broken_chain_is_detected() {
        let commits = vec![upload("c2", Some("missing"), 2)];
        let err = ancestor_chain(&commits, &CommitId::new("c2")).unwrap_err();
        assert_eq!(err, CommitLogError::BrokenChain(CommitId::new("c2")));
    }

    #[test]
    fn main_head_is_newest_with_no_branch() {
        let commits = vec![upload("c1", None, 1), upload("c2", Some("c1"), 2)];
        let head = main_head(&commits).unwrap();
        assert_eq!(head.id, CommitId::new("c2"));
    }

    #[test]
    fn replay_is_deterministic_across_calls() {
        let diff_commit = commit(
            "c1",
            None,
            CommitPayload::ManualEdit {
                description: "seed".into(),
                diff: SceneGraphDiff {
                    objects: vec![ObjectDelta::Create(crate::domain::scene::SceneObject {
                        id: crate::domain::identifiers::ObjectId::new("o1"),
                        object_type: crate::domain::scene::ObjectType::Door,
                        label: "door".into(),
                        pose: crate::domain::scene::Pose {
                            position: crate::domain::scene::Vector3::ZERO,
                            rotation: crate::domain::scene::Quaternion::IDENTITY,
                        },
                        bbox: crate::domain::scene::Bbox::new(
                            crate::domain::scene::Vector3::ZERO,
                            crate::domain::scene::Vector3 { x: 1.0, y: 1.0, z: 2.0 },
                        ),
                        state: crate::domain::scene::ObjectState::Visible,
                        confidence: 0.9,
                        source_commit_ids: Vec::new(),
                        evidence_ids: Vec::new(),
                        metadata: serde_json::Value::Null,
                    })],
                    ..Default::default()
                },
            },
            1,
        );
        let commits = vec![diff_commit];
        let a = replay_to_commit(&commits, &CommitId::new("c1")).unwrap();
        let b = replay_to_commit(&commits, &CommitId::new("c1")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.objects.len(), 1);
    }
}
