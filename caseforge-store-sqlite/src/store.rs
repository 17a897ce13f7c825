// caseforge-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Persistence Store
// Description: Durable PersistenceStore backed by SQLite WAL.
// Purpose: Persist every case aggregate as an indexed row over a canonical
//          JSON body, mirroring InMemoryStore's semantics.
// Dependencies: caseforge-core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Each table stores the full aggregate as a JSON blob plus the columns
//! needed to filter and order without deserializing every row
//! (`case_id`, `branch_id`, `job_id`, `status`, `created_at_nanos`, ...).
//! Rows that fail to deserialize surface as [`StoreError::Corrupt`] rather
//! than panicking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine;
use caseforge_core::commitlog;
use caseforge_core::domain::asset::Asset;
use caseforge_core::domain::asset::AssetKind;
use caseforge_core::domain::branch::Branch;
use caseforge_core::domain::case::Case;
use caseforge_core::domain::commit::Commit;
use caseforge_core::domain::identifiers::AssetId;
use caseforge_core::domain::identifiers::BranchId;
use caseforge_core::domain::identifiers::CaseId;
use caseforge_core::domain::identifiers::CommitId;
use caseforge_core::domain::identifiers::IdempotencyKey;
use caseforge_core::domain::identifiers::JobId;
use caseforge_core::domain::job::Job;
use caseforge_core::domain::job::JobStatus;
use caseforge_core::domain::profile::SuspectProfile;
use caseforge_core::domain::scene::SceneGraph;
use caseforge_core::domain::scene::SceneGraphDiff;
use caseforge_core::interfaces::store::CommitPage;
use caseforge_core::interfaces::store::PersistenceStore;
use caseforge_core::interfaces::store::RetryBudget;
use caseforge_core::interfaces::store::SceneSnapshot;
use caseforge_core::interfaces::store::StoreError;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version written by this crate.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended for concurrent readers).
    #[default]
    Wal,
    /// Classic rollback-journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `PRAGMA journal_mode` value for this mode.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Fsync on every commit (safest).
    #[default]
    Full,
    /// Fsync less aggressively; safe under WAL.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `PRAGMA synchronous` value for this mode.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for [`SqliteStore::new`].
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the database file; created if absent.
    pub path: PathBuf,
    /// Busy timeout, in milliseconds, before a lock wait gives up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors specific to the `SQLite` backend, convertible into [`StoreError`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Filesystem error while preparing the database path.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// An underlying `SQLite` driver error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// A stored row failed to decode.
    #[error("sqlite store corrupt row: {0}")]
    Corrupt(String),
    /// The database's schema version is not one this build understands.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
        }
    }
}

fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`PersistenceStore`].
///
/// A single connection, guarded by a mutex, is shared across calls — `SQLite`
/// serializes writers regardless, and `PersistenceStore` gives no caller a
/// way to pipeline requests against one store instance.
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if absent) a `SQLite`-backed store and migrates its
    /// schema.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the parent directory cannot be
    /// created, the database cannot be opened, or an existing database
    /// carries an unsupported schema version.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }

    fn commits_for_case(&self, case_id: &CaseId) -> Result<Vec<Commit>, SqliteStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT commit_json FROM commits WHERE case_id = ?1").map_err(db_err)?;
        let rows = stmt.query_map(params![case_id.as_str()], |row| row.get::<_, Vec<u8>>(0)).map_err(db_err)?;
        let mut commits = Vec::new();
        for row in rows {
            commits.push(from_json(&row.map_err(db_err)?, "commit")?);
        }
        Ok(commits)
    }

    /// Loads, mutates, re-timestamps, and rewrites a job row in one
    /// transaction.
    fn mutate_job(&self, id: &JobId, mutate: impl FnOnce(&mut Job)) -> Result<(), SqliteStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let bytes: Option<Vec<u8>> = tx
            .query_row("SELECT job_json FROM jobs WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        let Some(bytes) = bytes else {
            return Err(SqliteStoreError::Db("job not found".to_string()));
        };
        let mut job: Job = from_json(&bytes, "job")?;
        mutate(&mut job);
        job.updated_at = OffsetDateTime::now_utc();
        let updated_at_nanos = nanos_of(job.updated_at)?;
        let json = to_json(&job, "job")?;
        tx.execute(
            "UPDATE jobs SET status = ?1, updated_at_nanos = ?2, job_json = ?3 WHERE id = ?4",
            params![job_status_label(job.status), updated_at_nanos, json, id.as_str()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }
}

/// Creates the database file's parent directory if it does not exist.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
        }
        _ => Ok(()),
    }
}

/// Opens a connection and applies durability pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal mode, synchronous mode, foreign keys, and busy timeout.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    connection.busy_timeout(StdDuration::from_millis(config.busy_timeout_ms)).map_err(db_err)?;
    Ok(())
}

/// Creates the schema on a fresh database, or validates the version of an
/// existing one.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);").map_err(db_err)?;
    let version: Option<i64> =
        tx.query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0)).optional().map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION]).map_err(db_err)?;
            tx.execute_batch(SCHEMA_DDL).map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(db_err)
}

const SCHEMA_DDL: &str = "
    CREATE TABLE IF NOT EXISTS cases (
        id TEXT PRIMARY KEY,
        created_at_nanos INTEGER NOT NULL,
        case_json BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS commits (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        branch_id TEXT,
        job_id TEXT,
        created_at_nanos INTEGER NOT NULL,
        commit_json BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_commits_case ON commits (case_id, created_at_nanos, id);
    CREATE INDEX IF NOT EXISTS idx_commits_case_branch ON commits (case_id, branch_id);
    CREATE INDEX IF NOT EXISTS idx_commits_job ON commits (job_id);
    CREATE TABLE IF NOT EXISTS branches (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        name TEXT NOT NULL,
        branch_json BLOB NOT NULL,
        UNIQUE (case_id, name)
    );
    CREATE TABLE IF NOT EXISTS scene_snapshots (
        case_id TEXT PRIMARY KEY,
        commit_id TEXT NOT NULL,
        snapshot_json BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS suspect_profiles (
        case_id TEXT PRIMARY KEY,
        profile_json BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        status TEXT NOT NULL,
        idempotency_key TEXT UNIQUE,
        created_at_nanos INTEGER NOT NULL,
        updated_at_nanos INTEGER NOT NULL,
        job_json BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_case ON jobs (case_id, created_at_nanos);
    CREATE INDEX IF NOT EXISTS idx_jobs_status_updated ON jobs (status, updated_at_nanos);
    CREATE TABLE IF NOT EXISTS assets (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        storage_key TEXT NOT NULL UNIQUE,
        asset_json BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_assets_case_kind ON assets (case_id, kind);
";

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn nanos_of(at: OffsetDateTime) -> Result<i64, SqliteStoreError> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| SqliteStoreError::Corrupt("timestamp out of i64 nanosecond range".to_string()))
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>, SqliteStoreError> {
    serde_json::to_vec(value).map_err(|err| SqliteStoreError::Corrupt(format!("failed to serialize {what}: {err}")))
}

fn from_json<T: for<'de> Deserialize<'de>>(bytes: &[u8], what: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Corrupt(format!("failed to decode {what}: {err}")))
}

fn job_status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Done => "done",
        JobStatus::Failed => "failed",
        JobStatus::Canceled => "canceled",
    }
}

fn asset_kind_label(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::ScanImage => "scan_image",
        AssetKind::GeneratedImage => "generated_image",
        AssetKind::Mesh => "mesh",
        AssetKind::Pointcloud => "pointcloud",
        AssetKind::Portrait => "portrait",
        AssetKind::Report => "report",
        AssetKind::ReplayVideo => "replay_video",
        AssetKind::EvidenceModel => "evidence_model",
    }
}

/// Encodes a commit pagination cursor as `base64("{nanos}:{id}")`, matching
/// [`caseforge_core::store::memory::InMemoryStore`]'s cursor scheme.
fn encode_cursor(nanos: i64, id: &CommitId) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{nanos}:{}", id.as_str()))
}

struct CommitCursor {
    nanos: i64,
    id: String,
}

fn decode_cursor(cursor: &str) -> Result<CommitCursor, SqliteStoreError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid cursor: {err}")))?;
    let raw = String::from_utf8(raw).map_err(|err| SqliteStoreError::Corrupt(format!("invalid cursor: {err}")))?;
    let (nanos, id) = raw.split_once(':').ok_or_else(|| SqliteStoreError::Corrupt("invalid cursor".to_string()))?;
    let nanos: i64 = nanos.parse().map_err(|_| SqliteStoreError::Corrupt("invalid cursor".to_string()))?;
    Ok(CommitCursor { nanos, id: id.to_string() })
}

// ============================================================================
// SECTION: PersistenceStore
// ============================================================================

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn create_case(&self, case: Case) -> Result<(), StoreError> {
        let nanos = nanos_of(case.created_at)?;
        let json = to_json(&case, "case")?;
        let conn = self.lock()?;
        match conn.execute(
            "INSERT INTO cases (id, created_at_nanos, case_json) VALUES (?1, ?2, ?3)",
            params![case.id.as_str(), nanos, json],
        ) {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                Err(StoreError::Conflict(format!("case {} already exists", case.id)))
            }
            Err(err) => Err(db_err(err).into()),
        }
    }

    async fn get_case(&self, id: &CaseId) -> Result<Option<Case>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT case_json FROM cases WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "case")).transpose().map_err(Into::into)
    }

    async fn list_cases(&self) -> Result<Vec<Case>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT case_json FROM cases ORDER BY created_at_nanos DESC").map_err(db_err)?;
        let rows = stmt.query_map(params![], |row| row.get::<_, Vec<u8>>(0)).map_err(db_err)?;
        let mut cases = Vec::new();
        for row in rows {
            cases.push(from_json(&row.map_err(db_err)?, "case")?);
        }
        Ok(cases)
    }

    async fn create_commit(&self, commit: Commit) -> Result<(), StoreError> {
        let nanos = nanos_of(commit.created_at)?;
        let job_id = commit.payload.job_id().map(JobId::as_str);
        let branch_id = commit.branch_id.as_ref().map(BranchId::as_str);
        let json = to_json(&commit, "commit")?;
        let conn = self.lock()?;
        match conn.execute(
            "INSERT INTO commits (id, case_id, branch_id, job_id, created_at_nanos, commit_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![commit.id.as_str(), commit.case_id.as_str(), branch_id, job_id, nanos, json],
        ) {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                Err(StoreError::Conflict(format!("commit {} already exists", commit.id)))
            }
            Err(err) => Err(db_err(err).into()),
        }
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT commit_json FROM commits WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "commit")).transpose().map_err(Into::into)
    }

    async fn get_latest_commit(&self, case_id: &CaseId) -> Result<Option<Commit>, StoreError> {
        let commits = self.commits_for_case(case_id)?;
        Ok(commitlog::main_head(&commits).cloned())
    }

    async fn get_latest_commit_on_branch(
        &self,
        case_id: &CaseId,
        branch_id: &BranchId,
    ) -> Result<Option<Commit>, StoreError> {
        let commits = self.commits_for_case(case_id)?;
        Ok(commitlog::branch_head(&commits, branch_id).cloned())
    }

    async fn get_commits_by_case(
        &self,
        case_id: &CaseId,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CommitPage, StoreError> {
        let boundary = cursor.map(decode_cursor).transpose()?;
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT commit_json, created_at_nanos FROM commits WHERE case_id = ?1 \
                 ORDER BY created_at_nanos DESC, id DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![case_id.as_str()], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;
        let mut all = Vec::new();
        for row in rows {
            let (bytes, nanos) = row.map_err(db_err)?;
            all.push((from_json::<Commit>(&bytes, "commit")?, nanos));
        }
        drop(conn);

        let start = match &boundary {
            Some(boundary) => all
                .iter()
                .position(|(commit, nanos)| *nanos == boundary.nanos && commit.id.as_str() == boundary.id)
                .map_or(0, |pos| pos + 1),
            None => 0,
        };
        let total = all.len();
        let page: Vec<(Commit, i64)> = all.into_iter().skip(start).take(limit).collect();
        let next_cursor = if start + page.len() < total {
            page.last().map(|(commit, nanos)| encode_cursor(*nanos, &commit.id))
        } else {
            None
        };
        Ok(CommitPage { commits: page.into_iter().map(|(commit, _)| commit).collect(), next_cursor })
    }

    async fn get_commit_by_job_id(&self, job_id: &JobId) -> Result<Option<Commit>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT commit_json FROM commits WHERE job_id = ?1 LIMIT 1", params![job_id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "commit")).transpose().map_err(Into::into)
    }

    async fn get_commit_diff(&self, case_id: &CaseId, a: &CommitId, b: &CommitId) -> Result<SceneGraphDiff, StoreError> {
        let graph_a = self.replay_to_commit(case_id, a).await?;
        let graph_b = self.replay_to_commit(case_id, b).await?;
        Ok(graph_a.diff_against(&graph_b))
    }

    async fn replay_to_commit(&self, case_id: &CaseId, commit_id: &CommitId) -> Result<SceneGraph, StoreError> {
        let commits = self.commits_for_case(case_id)?;
        commitlog::replay_to_commit(&commits, commit_id).map_err(|err| StoreError::Corrupt(err.to_string()))
    }

    async fn upsert_scene_snapshot(
        &self,
        case_id: &CaseId,
        commit_id: &CommitId,
        scenegraph: SceneGraph,
    ) -> Result<(), StoreError> {
        let snapshot = SceneSnapshot {
            case_id: case_id.clone(),
            commit_id: commit_id.clone(),
            scenegraph,
            updated_at: OffsetDateTime::now_utc(),
        };
        let json = to_json(&snapshot, "scene snapshot")?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scene_snapshots (case_id, commit_id, snapshot_json) VALUES (?1, ?2, ?3) \
             ON CONFLICT(case_id) DO UPDATE SET commit_id = excluded.commit_id, snapshot_json = excluded.snapshot_json",
            params![case_id.as_str(), commit_id.as_str(), json],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_scene_snapshot(&self, case_id: &CaseId) -> Result<Option<SceneSnapshot>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row(
                "SELECT snapshot_json FROM scene_snapshots WHERE case_id = ?1",
                params![case_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "scene snapshot")).transpose().map_err(Into::into)
    }

    async fn create_branch(&self, branch: Branch) -> Result<(), StoreError> {
        let json = to_json(&branch, "branch")?;
        let conn = self.lock()?;
        match conn.execute(
            "INSERT INTO branches (id, case_id, name, branch_json) VALUES (?1, ?2, ?3, ?4)",
            params![branch.id.as_str(), branch.case_id.as_str(), branch.name, json],
        ) {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                Err(StoreError::Conflict(format!("branch name {} already exists", branch.name)))
            }
            Err(err) => Err(db_err(err).into()),
        }
    }

    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT branch_json FROM branches WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "branch")).transpose().map_err(Into::into)
    }

    async fn list_branches(&self, case_id: &CaseId) -> Result<Vec<Branch>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT branch_json FROM branches WHERE case_id = ?1").map_err(db_err)?;
        let rows = stmt.query_map(params![case_id.as_str()], |row| row.get::<_, Vec<u8>>(0)).map_err(db_err)?;
        let mut branches = Vec::new();
        for row in rows {
            branches.push(from_json(&row.map_err(db_err)?, "branch")?);
        }
        Ok(branches)
    }

    async fn get_suspect_profile(&self, case_id: &CaseId) -> Result<Option<SuspectProfile>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row(
                "SELECT profile_json FROM suspect_profiles WHERE case_id = ?1",
                params![case_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "suspect profile")).transpose().map_err(Into::into)
    }

    async fn upsert_suspect_profile(&self, profile: SuspectProfile) -> Result<(), StoreError> {
        let json = to_json(&profile, "suspect profile")?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO suspect_profiles (case_id, profile_json) VALUES (?1, ?2) \
             ON CONFLICT(case_id) DO UPDATE SET profile_json = excluded.profile_json",
            params![profile.case_id.as_str(), json],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn create_job(&self, job: Job) -> Result<Job, StoreError> {
        let created_at_nanos = nanos_of(job.created_at)?;
        let updated_at_nanos = nanos_of(job.updated_at)?;
        let idempotency_key = job.idempotency_key.as_ref().map(IdempotencyKey::as_str);
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        if let Some(key) = idempotency_key {
            let existing: Option<Vec<u8>> = tx
                .query_row("SELECT job_json FROM jobs WHERE idempotency_key = ?1", params![key], |row| row.get(0))
                .optional()
                .map_err(db_err)?;
            if let Some(bytes) = existing {
                tx.commit().map_err(db_err)?;
                return Ok(from_json(&bytes, "job")?);
            }
        }
        let json = to_json(&job, "job")?;
        tx.execute(
            "INSERT INTO jobs (id, case_id, status, idempotency_key, created_at_nanos, updated_at_nanos, job_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job.id.as_str(),
                job.case_id.as_str(),
                job_status_label(job.status),
                idempotency_key,
                created_at_nanos,
                updated_at_nanos,
                json
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT job_json FROM jobs WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "job")).transpose().map_err(Into::into)
    }

    async fn list_jobs_by_case(&self, case_id: &CaseId) -> Result<Vec<Job>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT job_json FROM jobs WHERE case_id = ?1 ORDER BY created_at_nanos DESC").map_err(db_err)?;
        let rows = stmt.query_map(params![case_id.as_str()], |row| row.get::<_, Vec<u8>>(0)).map_err(db_err)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(from_json(&row.map_err(db_err)?, "job")?);
        }
        Ok(jobs)
    }

    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> Result<(), StoreError> {
        job_result(self.mutate_job(id, |job| job.status = status))
    }

    async fn update_job_progress(&self, id: &JobId, progress: u8) -> Result<(), StoreError> {
        job_result(self.mutate_job(id, |job| job.progress = progress.min(100)))
    }

    async fn update_job_output(&self, id: &JobId, output: serde_json::Value) -> Result<(), StoreError> {
        job_result(self.mutate_job(id, |job| {
            job.output = Some(output);
            job.progress = 100;
            job.status = JobStatus::Done;
        }))
    }

    async fn update_job_error(&self, id: &JobId, error: String) -> Result<(), StoreError> {
        job_result(self.mutate_job(id, |job| {
            job.error = Some(error);
            job.status = JobStatus::Failed;
        }))
    }

    async fn update_job_heartbeat(&self, id: &JobId) -> Result<(), StoreError> {
        job_result(self.mutate_job(id, |_job| {}))
    }

    async fn increment_job_retry(&self, id: &JobId, max_attempts: u32) -> Result<RetryBudget, StoreError> {
        let mut outcome = RetryBudget::WithinBudget;
        job_result(self.mutate_job(id, |job| {
            job.retry_count += 1;
            outcome = if job.retry_count < max_attempts { RetryBudget::WithinBudget } else { RetryBudget::Exhausted };
        }))?;
        Ok(outcome)
    }

    async fn get_zombie_jobs(&self, timeout: StdDuration) -> Result<Vec<Job>, StoreError> {
        let now = OffsetDateTime::now_utc();
        let threshold = now
            - time::Duration::try_from(timeout).map_err(|err| StoreError::Backend(format!("invalid timeout: {err}")))?;
        let threshold_nanos = nanos_of(threshold)?;
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT job_json FROM jobs WHERE status = ?1 AND updated_at_nanos < ?2").map_err(db_err)?;
        let rows = stmt
            .query_map(params![job_status_label(JobStatus::Running), threshold_nanos], |row| row.get::<_, Vec<u8>>(0))
            .map_err(db_err)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(from_json(&row.map_err(db_err)?, "job")?);
        }
        Ok(jobs)
    }

    async fn create_asset(&self, asset: Asset) -> Result<(), StoreError> {
        let json = to_json(&asset, "asset")?;
        let conn = self.lock()?;
        match conn.execute(
            "INSERT INTO assets (id, case_id, kind, storage_key, asset_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![asset.id.as_str(), asset.case_id.as_str(), asset_kind_label(asset.kind), asset.storage_key, json],
        ) {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                Err(StoreError::Conflict(format!("asset {} or its storage key already exists", asset.id)))
            }
            Err(err) => Err(db_err(err).into()),
        }
    }

    async fn get_asset(&self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        let conn = self.lock()?;
        let row: Option<Vec<u8>> = conn
            .query_row("SELECT asset_json FROM assets WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        row.map(|bytes| from_json(&bytes, "asset")).transpose().map_err(Into::into)
    }

    async fn list_assets(&self, case_id: &CaseId, kind: Option<AssetKind>) -> Result<Vec<Asset>, StoreError> {
        let conn = self.lock()?;
        let mut assets = Vec::new();
        if let Some(kind) = kind {
            let mut stmt =
                conn.prepare("SELECT asset_json FROM assets WHERE case_id = ?1 AND kind = ?2").map_err(db_err)?;
            let rows = stmt
                .query_map(params![case_id.as_str(), asset_kind_label(kind)], |row| row.get::<_, Vec<u8>>(0))
                .map_err(db_err)?;
            for row in rows {
                assets.push(from_json(&row.map_err(db_err)?, "asset")?);
            }
        } else {
            let mut stmt = conn.prepare("SELECT asset_json FROM assets WHERE case_id = ?1").map_err(db_err)?;
            let rows = stmt.query_map(params![case_id.as_str()], |row| row.get::<_, Vec<u8>>(0)).map_err(db_err)?;
            for row in rows {
                assets.push(from_json(&row.map_err(db_err)?, "asset")?);
            }
        }
        Ok(assets)
    }
}

/// Maps `mutate_job`'s "job not found" sentinel to [`StoreError::NotFound`];
/// every other variant converts through [`SqliteStoreError`]'s `From` impl.
fn job_result(result: Result<(), SqliteStoreError>) -> Result<(), StoreError> {
    result.map_err(|err| match err {
        SqliteStoreError::Db(message) if message == "job not found" => StoreError::NotFound,
        other => other.into(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use caseforge_core::domain::commit::CommitPayload;
    use caseforge_core::domain::commit::EvidenceTier;
    use caseforge_core::domain::job::JobType;
    use tempfile::tempdir;

    use super::*;

    fn config(dir: &tempfile::TempDir) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: dir.path().join("caseforge.sqlite3"),
            busy_timeout_ms: 1_000,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Normal,
        }
    }

    fn sample_case(id: &str) -> Case {
        Case::new(CaseId::new(id), "Office Break-in", None, OffsetDateTime::now_utc()).unwrap()
    }

    #[tokio::test]
    async fn create_case_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        store.create_case(sample_case("c1")).await.unwrap();
        let err = store.create_case(sample_case("c1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn case_round_trips_through_storage() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        store.create_case(sample_case("c1")).await.unwrap();
        let loaded = store.get_case(&CaseId::new("c1")).await.unwrap().unwrap();
        assert_eq!(loaded.id, CaseId::new("c1"));
    }

    #[tokio::test]
    async fn create_job_is_idempotent_on_key_collision() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        let key = IdempotencyKey::new("k1");
        let job1 = Job::new(
            JobId::new("job-1"),
            CaseId::new("c1"),
            JobType::Reasoning,
            serde_json::json!({}),
            Some(key.clone()),
            OffsetDateTime::now_utc(),
        );
        let job2 = Job::new(
            JobId::new("job-2"),
            CaseId::new("c1"),
            JobType::Reasoning,
            serde_json::json!({}),
            Some(key),
            OffsetDateTime::now_utc(),
        );
        let first = store.create_job(job1).await.unwrap();
        let second = store.create_job(job2).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn increment_job_retry_reports_budget_exhaustion() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        let job = Job::new(
            JobId::new("job-1"),
            CaseId::new("c1"),
            JobType::Reasoning,
            serde_json::json!({}),
            None,
            OffsetDateTime::now_utc(),
        );
        store.create_job(job).await.unwrap();
        let id = JobId::new("job-1");
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::WithinBudget);
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::WithinBudget);
        assert_eq!(store.increment_job_retry(&id, 3).await.unwrap(), RetryBudget::Exhausted);
    }

    #[tokio::test]
    async fn update_job_progress_clamps_to_100() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        let job = Job::new(
            JobId::new("job-1"),
            CaseId::new("c1"),
            JobType::Reasoning,
            serde_json::json!({}),
            None,
            OffsetDateTime::now_utc(),
        );
        store.create_job(job).await.unwrap();
        let id = JobId::new("job-1");
        store.update_job_progress(&id, 250).await.unwrap();
        let loaded = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(loaded.progress, 100);
    }

    fn upload_commit(id: &str, case_id: &str, at: i64) -> Commit {
        Commit {
            id: CommitId::new(id),
            case_id: CaseId::new(case_id),
            parent_commit_id: None,
            branch_id: None,
            payload: CommitPayload::UploadScan { asset_keys: vec!["k.jpg".into()], tier: EvidenceTier::GroundTruth },
            summary: "upload".into(),
            created_at: OffsetDateTime::from_unix_timestamp(at).unwrap(),
            trace_id: None,
        }
    }

    #[tokio::test]
    async fn commits_by_case_paginate_newest_first() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        for i in 0..5i64 {
            store.create_commit(upload_commit(&format!("c{i}"), "case-1", i)).await.unwrap();
        }
        let page1 = store.get_commits_by_case(&CaseId::new("case-1"), 2, None).await.unwrap();
        assert_eq!(page1.commits.len(), 2);
        assert_eq!(page1.commits[0].id, CommitId::new("c4"));
        let page2 = store.get_commits_by_case(&CaseId::new("case-1"), 2, page1.next_cursor.as_deref()).await.unwrap();
        assert_eq!(page2.commits[0].id, CommitId::new("c2"));
    }

    #[tokio::test]
    async fn create_asset_rejects_duplicate_storage_key() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config(&dir)).unwrap();
        store.create_case(sample_case("c1")).await.unwrap();
        let asset = Asset {
            id: AssetId::new("a1"),
            case_id: CaseId::new("c1"),
            kind: AssetKind::ScanImage,
            storage_key: "scans/a1.jpg".into(),
            metadata: serde_json::json!({}),
            created_at: OffsetDateTime::now_utc(),
        };
        store.create_asset(asset.clone()).await.unwrap();
        let mut dup = asset;
        dup.id = AssetId::new("a2");
        let err = store.create_asset(dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn reopening_an_existing_database_preserves_rows() {
        let dir = tempdir().unwrap();
        {
            let store = SqliteStore::new(config(&dir)).unwrap();
            store.create_case(sample_case("c1")).await.unwrap();
        }
        let store = SqliteStore::new(config(&dir)).unwrap();
        assert!(store.get_case(&CaseId::new("c1")).await.unwrap().is_some());
    }
}
