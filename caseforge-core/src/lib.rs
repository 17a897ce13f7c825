// caseforge-core/src/lib.rs
// ============================================================================
// Module: Caseforge Core Library
// Description: Public API surface for the Caseforge core crate.
// Purpose: Expose the domain model, storage/queue/client interfaces, the
//          commit-log fold, and the in-memory store.
// Dependencies: crate::{domain, interfaces, commitlog, store}
// ============================================================================

//! ## Overview
//! Caseforge core is the backend-agnostic heart of the case control plane:
//! the domain model (case, commit, branch, scene graph, suspect profile,
//! job, asset), the narrow interfaces workers and the HTTP layer depend on
//! (`PersistenceStore`, `Queue`, the AI-client traits), and the pure
//! commit-log fold that turns a commit chain into a materialized
//! `SceneGraph`. Nothing here spawns a task or opens a connection; those
//! concerns live in `caseforge-worker`, `caseforge-store-sqlite`,
//! `caseforge-queue`, `caseforge-clients`, and `caseforge-api`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod commitlog;
pub mod domain;
pub mod interfaces;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use domain::asset::Asset;
pub use domain::asset::AssetKind;
pub use domain::branch::Branch;
pub use domain::case::Case;
pub use domain::commit::Commit;
pub use domain::commit::CommitPayload;
pub use domain::commit::CommitType;
pub use domain::identifiers::AssetId;
pub use domain::identifiers::BranchId;
pub use domain::identifiers::CaseId;
pub use domain::identifiers::CommitId;
pub use domain::identifiers::CorrelationId;
pub use domain::identifiers::IdempotencyKey;
pub use domain::identifiers::JobId;
pub use domain::identifiers::ObjectId;
pub use domain::identifiers::ProfileId;
pub use domain::job::Job;
pub use domain::job::JobMessage;
pub use domain::job::JobStatus;
pub use domain::job::JobType;
pub use domain::profile::SuspectAttributes;
pub use domain::profile::SuspectProfile;
pub use domain::scene::SceneGraph;
pub use domain::scene::SceneGraphDiff;

pub use interfaces::Asset3DClient;
pub use interfaces::ClientError;
pub use interfaces::ErrorClass;
pub use interfaces::ImageGenClient;
pub use interfaces::LeaseId;
pub use interfaces::LeasedMessage;
pub use interfaces::NackOutcome;
pub use interfaces::PersistenceStore;
pub use interfaces::ProfileClient;
pub use interfaces::Queue;
pub use interfaces::QueueError;
pub use interfaces::ReasoningClient;
pub use interfaces::ReconstructionClient;
pub use interfaces::ReplayClient;
pub use interfaces::SceneAnalysisClient;
pub use interfaces::SceneSnapshot;
pub use interfaces::StorageClient;
pub use interfaces::StoreError;

pub use commitlog::CommitLogError;
pub use store::memory::InMemoryStore;
