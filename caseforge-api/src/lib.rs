// caseforge-api/src/lib.rs
// ============================================================================
// Module: Caseforge API
// Description: The REST HTTP surface over the CaseForge control plane.
// Purpose: Assemble the axum Router and provide the `serve` entrypoint the
//          CLI binds to an address.
// Dependencies: caseforge-core, caseforge-queue, axum, tokio, tower-http
// ============================================================================

//! ## Overview
//! `caseforge-api` exposes every endpoint enumerated for the HTTP surface:
//! case lifecycle, uploads, job submission, witness statements, branches,
//! reasoning, export, and the per-case change feed. Handlers validate
//! request shape and call straight into [`caseforge_core::PersistenceStore`]
//! and [`caseforge_core::Queue`] — no business logic lives here, matching
//! the API layer's job as thin glue described for the overall system.

pub mod changefeed;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

pub use error::ApiError;
pub use error::ApiErrorCode;
pub use state::AppState;
pub use state::SharedState;

/// Errors that can prevent the HTTP server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// `bind_addr` could not be parsed as a socket address.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The server loop exited with an I/O error.
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Binds `bind_addr` and serves the `/v1` API until the process is
/// terminated.
///
/// # Errors
/// Returns [`ServeError`] if `bind_addr` does not parse or the socket
/// cannot be bound.
pub async fn serve(state: Arc<AppState>, bind_addr: &str, cors_origins: &[String]) -> Result<(), ServeError> {
    let addr: SocketAddr =
        bind_addr.parse().map_err(|_| ServeError::InvalidAddress(bind_addr.to_string()))?;
    let router = routes::router(state, cors_origins);

    tracing::info!(%addr, "caseforge-api listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    axum::serve(listener, router).await.map_err(ServeError::Server)
}
