// caseforge-worker/src/registry.rs
// ============================================================================
// Module: Worker Type Registry
// Description: A process-wide, write-once record of which job types have a
//              registered worker.
// Purpose: Let the HTTP layer reject job-creation requests for job types no
//          worker will ever process, without threading a Framework
//          reference through every handler.
// Dependencies: caseforge-core, std::sync::OnceLock
// ============================================================================

//! ## Overview
//! A single collection populated only during startup registration and
//! read-only afterward, guarded here by a [`std::sync::OnceLock`] plus an
//! inner `Mutex` rather than a full provider trait-object map, since all
//! this registry tracks is which [`JobType`]s are live.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::OnceLock;

use caseforge_core::JobType;

fn registered() -> &'static Mutex<BTreeSet<JobType>> {
    static REGISTERED: OnceLock<Mutex<BTreeSet<JobType>>> = OnceLock::new();
    REGISTERED.get_or_init(|| Mutex::new(BTreeSet::new()))
}

/// Records that a worker for `job_type` has been registered with a
/// [`crate::framework::Framework`].
pub fn register(job_type: JobType) {
    let mut guard = registered().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.insert(job_type);
}

/// Returns whether a worker for `job_type` has been registered.
#[must_use]
pub fn is_registered(job_type: JobType) -> bool {
    registered().lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains(&job_type)
}

/// Returns every registered job type, in a stable order.
#[must_use]
pub fn registered_types() -> Vec<JobType> {
    registered().lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_and_queryable() {
        register(JobType::Export);
        register(JobType::Export);
        assert!(is_registered(JobType::Export));
        assert!(registered_types().contains(&JobType::Export));
    }
}
