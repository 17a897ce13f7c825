// caseforge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Interfaces
// Description: Aggregates the narrow, mockable interfaces consumed by
//              workers and the HTTP layer: PersistenceStore, Queue, and
//              the AI-client / StorageClient contracts.
// Purpose: Single import surface for trait consumers and implementors.
// Dependencies: async-trait
// ============================================================================

pub mod clients;
pub mod queue;
pub mod store;

pub use clients::Asset3DClient;
pub use clients::ClientError;
pub use clients::ErrorClass;
pub use clients::ImageGenClient;
pub use clients::ProfileClient;
pub use clients::ReasoningClient;
pub use clients::ReconstructionClient;
pub use clients::ReplayClient;
pub use clients::SceneAnalysisClient;
pub use clients::StorageClient;
pub use queue::LeaseId;
pub use queue::LeasedMessage;
pub use queue::NackOutcome;
pub use queue::Queue;
pub use queue::QueueError;
pub use store::CommitPage;
pub use store::PersistenceStore;
pub use store::RetryBudget;
pub use store::SceneSnapshot;
pub use store::StoreError;
