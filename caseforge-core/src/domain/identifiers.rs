// caseforge-core/src/domain/identifiers.rs
// ============================================================================
// Module: CaseForge Identifiers
// Description: Canonical opaque identifiers for cases, commits, branches,
//              jobs, and assets.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque string wrappers. They never carry structural
//! meaning of their own; validation (format, existence) happens at the
//! store boundary, not in these types.

use std::fmt;
use std::sync::OnceLock;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;

/// Boot-scoped identifier generator: a random 64-bit boot id paired with a
/// monotonic per-process counter, the same scheme as a server-issued
/// correlation id. Uniqueness holds within a process lifetime, which is
/// sufficient since every id is persisted before it is reused elsewhere.
struct IdGenerator {
    prefix: &'static str,
    boot_id: u64,
    counter: std::sync::atomic::AtomicU64,
}

impl IdGenerator {
    fn new(prefix: &'static str) -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            prefix,
            boot_id: u64::from_be_bytes(bytes),
            counter: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, seq)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Issues a fresh, process-unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                static GENERATOR: OnceLock<IdGenerator> = OnceLock::new();
                Self(GENERATOR.get_or_init(|| IdGenerator::new($prefix)).issue())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifies a case: the top-level container for a detective investigation.
    CaseId,
    "case"
);
string_id!(
    /// Identifies a single append-only commit in a case's history.
    CommitId,
    "commit"
);
string_id!(
    /// Identifies a named branch (a mutable pointer to a commit) within a case.
    BranchId,
    "branch"
);
string_id!(
    /// Identifies a queued unit of work dispatched to a worker.
    JobId,
    "job"
);
string_id!(
    /// Identifies a stored binary artifact (image, 3D asset, export).
    AssetId,
    "asset"
);
string_id!(
    /// Identifies an object within a scene graph, stable across commits.
    ObjectId,
    "obj"
);
string_id!(
    /// Identifies a suspect profile tracked within a case.
    ProfileId,
    "profile"
);
string_id!(
    /// Caller-supplied key used to deduplicate job submissions.
    IdempotencyKey,
    "idem"
);
string_id!(
    /// Opaque correlation identifier threaded from a request into logs.
    CorrelationId,
    "corr"
);
