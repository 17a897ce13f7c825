// caseforge-core/src/domain/branch.rs
// ============================================================================
// Module: Branch
// Description: Named alternative timelines forked from a base commit.
// Purpose: Define the Branch type and its validation.
// Dependencies: serde, time
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::BranchId;
use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::CommitId;

/// Maximum length, in bytes, of a branch name.
pub const MAX_NAME_LEN: usize = 100;

/// A named alternative timeline forked from a base commit, used to compare
/// hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Opaque unique identifier.
    pub id: BranchId,
    /// The case this branch belongs to.
    pub case_id: CaseId,
    /// Name, unique per case, `<=` [`MAX_NAME_LEN`] bytes.
    pub name: String,
    /// The commit this branch was forked from.
    pub base_commit_id: CommitId,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// Error returned when a branch cannot be constructed from caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BranchValidationError {
    /// The name was empty.
    #[error("branch name must not be empty")]
    NameEmpty,
    /// The name exceeded [`MAX_NAME_LEN`] bytes.
    #[error("branch name exceeds {MAX_NAME_LEN} bytes")]
    NameTooLong,
}

impl Branch {
    /// Creates a new branch.
    ///
    /// # Errors
    /// Returns [`BranchValidationError`] if `name` is empty or exceeds
    /// [`MAX_NAME_LEN`] bytes. Uniqueness per case is enforced by the
    /// persistence store, not here.
    pub fn new(
        id: BranchId,
        case_id: CaseId,
        name: impl Into<String>,
        base_commit_id: CommitId,
        created_at: OffsetDateTime,
    ) -> Result<Self, BranchValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BranchValidationError::NameEmpty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(BranchValidationError::NameTooLong);
        }
        Ok(Self { id, case_id, name, base_commit_id, created_at })
    }
}
