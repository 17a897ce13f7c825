// caseforge-api/src/state.rs
// ============================================================================
// Module: Application State
// Description: The shared handles every route handler needs.
// Purpose: Define AppState and the SharedState alias axum extracts per
//          request.
// Dependencies: caseforge-core, caseforge-queue, caseforge-worker
// ============================================================================

//! ## Overview
//! One [`AppState`] is built at startup and shared via `axum::extract::State`
//! across every request: the persistence store, the job queue, the storage
//! client backing upload/download URLs, and the in-process change feed.

use std::sync::Arc;

use caseforge_core::PersistenceStore;
use caseforge_core::Queue;
use caseforge_core::StorageClient;

use crate::changefeed::ChangeFeed;

/// Shared application state, cheap to clone via the inner `Arc`s.
pub struct AppState {
    /// Durable storage for cases, commits, branches, jobs, and assets.
    pub store: Arc<dyn PersistenceStore>,
    /// The job queue workers poll.
    pub queue: Arc<dyn Queue>,
    /// Presigned-URL and object storage for uploaded and generated assets.
    pub storage: Arc<dyn StorageClient>,
    /// Best-effort per-case commit/job change feed.
    pub changefeed: ChangeFeed,
}

impl AppState {
    /// Builds application state from its constituent handles.
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        queue: Arc<dyn Queue>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self { store, queue, storage, changefeed: ChangeFeed::new() }
    }
}

/// The state type extracted by every handler.
pub type SharedState = Arc<AppState>;
