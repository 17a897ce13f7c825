// caseforge-core/src/domain/case.rs
// ============================================================================
// Module: Case
// Description: The root aggregate of a detective investigation.
// Purpose: Define the Case type and the validation applied at creation.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A case is the top-level container every other record hangs off of:
//! commits, branches, the scene snapshot, the suspect profile, jobs, and
//! assets all reference a case-id and are deleted with it.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::CaseId;

/// Maximum length, in bytes, of a case title.
pub const MAX_TITLE_LEN: usize = 200;

/// A detective investigation and the root scope for its timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Opaque unique identifier.
    pub id: CaseId,
    /// Human-readable title, 1..=200 bytes.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Schema version of this record, for forward-compatible migrations.
    pub schema_version: u16,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// Current schema version written for new cases.
pub const CASE_SCHEMA_VERSION: u16 = 1;

/// Error returned when a case cannot be constructed from caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseValidationError {
    /// The title was empty.
    #[error("case title must not be empty")]
    TitleEmpty,
    /// The title exceeded [`MAX_TITLE_LEN`] bytes.
    #[error("case title exceeds {MAX_TITLE_LEN} bytes")]
    TitleTooLong,
}

impl Case {
    /// Creates a new case with the given id, title, and optional description.
    ///
    /// # Errors
    /// Returns [`CaseValidationError`] if `title` is empty or exceeds
    /// [`MAX_TITLE_LEN`] bytes.
    pub fn new(
        id: CaseId,
        title: impl Into<String>,
        description: Option<String>,
        created_at: OffsetDateTime,
    ) -> Result<Self, CaseValidationError> {
        let title = title.into();
        if title.is_empty() {
            return Err(CaseValidationError::TitleEmpty);
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(CaseValidationError::TitleTooLong);
        }
        Ok(Self {
            id,
            title,
            description,
            schema_version: CASE_SCHEMA_VERSION,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn rejects_empty_title() {
        let err = Case::new(CaseId::new("c1"), "", None, now()).unwrap_err();
        assert_eq!(err, CaseValidationError::TitleEmpty);
    }

    #[test]
    fn rejects_oversized_title() {
        let title = "x".repeat(MAX_TITLE_LEN + 1);
        let err = Case::new(CaseId::new("c1"), title, None, now()).unwrap_err();
        assert_eq!(err, CaseValidationError::TitleTooLong);
    }

    #[test]
    fn accepts_valid_title() {
        let case = Case::new(CaseId::new("c1"), "Tech Corp Office Break-in", None, now()).unwrap();
        assert_eq!(case.schema_version, CASE_SCHEMA_VERSION);
    }
}
