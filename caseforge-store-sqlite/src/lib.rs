// caseforge-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Persistence Store
// Description: Durable PersistenceStore backend using SQLite WAL.
// Purpose: Provide production-grade persistence for CaseForge.
// Dependencies: caseforge-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`PersistenceStore`] implementation
//! that persists every case aggregate (cases, commits, branches, scene
//! snapshots, suspect profiles, jobs, assets) as indexed rows over a
//! canonical JSON body, mirroring the in-memory store's semantics with
//! durable storage underneath.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
