//! Ledger error types.
//!
//! Defines [`LedgerError`], the single error type returned by every ledger
//! operation. Messages are self-contained: a caller receiving one should know
//! what went wrong and how to retry without further context. `Conflict` and
//! `State` carry the head the caller needs to re-fetch.

use std::fmt;

use serde::{Deserialize, Serialize};

use pageledger_patch::PatchError;

use crate::model::types::{CommitHash, Op, PageKey, ProjectId, Role, Tier, UserId, ValidationError};

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Unified error type for ledger operations.
#[derive(Debug)]
pub enum LedgerError {
    /// Malformed input: bad patch range, non-positive page number, bad id.
    Validation {
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An unknown project, page, commit or member.
    NotFound {
        /// What was looked up, e.g. `"commit 3f2a…"`.
        what: String,
    },

    /// The client built its edit on a stale view of the page.
    Conflict {
        /// The page that moved on.
        page: PageKey,
        /// The parent the client diffed against.
        base: Option<CommitHash>,
        /// The page's actual latest commit.
        current_head: Option<CommitHash>,
    },

    /// The actor's role does not allow the operation.
    Permission {
        /// The acting user.
        user: UserId,
        /// The project the check ran against.
        project: ProjectId,
        /// The user's resolved role.
        role: Role,
        /// The operation that was refused.
        op: Op,
    },

    /// A transition was attempted from the wrong tier or on a non-HEAD commit.
    State {
        /// The commit the transition targeted.
        hash: CommitHash,
        /// Its current tier.
        tier: Tier,
        /// Why the transition is not allowed.
        reason: String,
        /// The head the caller should re-fetch, when relevant.
        current_head: Option<CommitHash>,
    },

    /// The change would break a membership invariant (last admin).
    Invariant {
        /// Human-readable description of the violated invariant.
        detail: String,
    },

    /// Persisting or loading ledger state failed.
    Storage {
        /// Human-readable description, including the path involved.
        detail: String,
    },
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Shorthand for [`LedgerError::Validation`].
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// Shorthand for [`LedgerError::Storage`].
    pub fn storage(detail: impl Into<String>) -> Self {
        Self::Storage {
            detail: detail.into(),
        }
    }

    /// The wire-level classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::State { .. } => ErrorKind::State,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// The head hash a caller should re-fetch before retrying, if any.
    #[must_use]
    pub const fn current_head(&self) -> Option<&CommitHash> {
        match self {
            Self::Conflict { current_head, .. } | Self::State { current_head, .. } => {
                current_head.as_ref()
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Wire classification of failures, as reported to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`LedgerError::Validation`].
    Validation,
    /// See [`LedgerError::NotFound`].
    NotFound,
    /// See [`LedgerError::Conflict`].
    Conflict,
    /// See [`LedgerError::Permission`].
    Permission,
    /// See [`LedgerError::State`].
    State,
    /// See [`LedgerError::Invariant`].
    Invariant,
    /// See [`LedgerError::Storage`].
    Storage,
    /// The request itself could not be decoded.
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Permission => "permission",
            Self::State => "state",
            Self::Invariant => "invariant",
            Self::Storage => "storage",
            Self::Parse => "parse",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn fmt_head(head: Option<&CommitHash>) -> String {
    head.map_or_else(|| "(empty page)".to_owned(), ToString::to_string)
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { detail } => {
                write!(f, "invalid request: {detail}")
            }
            Self::NotFound { what } => {
                write!(
                    f,
                    "{what} not found.\n  To fix: check the identifier, or list what exists first."
                )
            }
            Self::Conflict {
                page,
                base,
                current_head,
            } => {
                write!(
                    f,
                    "stale edit on {page}: built on {} but the latest commit is {}.\n  To fix: re-fetch the page, re-diff against {} and resubmit.",
                    fmt_head(base.as_ref()),
                    fmt_head(current_head.as_ref()),
                    fmt_head(current_head.as_ref()),
                )
            }
            Self::Permission {
                user,
                project,
                role,
                op,
            } => {
                write!(
                    f,
                    "user {user} is {role} on project {project} and may not {op} (requires {}).\n  To fix: ask a project admin to change your role.",
                    op.required_role()
                )
            }
            Self::State {
                hash,
                tier,
                reason,
                current_head,
            } => {
                write!(f, "commit {} ({tier}): {reason}", hash.short())?;
                if let Some(head) = current_head {
                    write!(f, "\n  To fix: re-fetch the head ({head}) and retry against it.")?;
                }
                Ok(())
            }
            Self::Invariant { detail } => {
                write!(f, "refused: {detail}\n  To fix: make another member admin first.")
            }
            Self::Storage { detail } => {
                write!(f, "storage error: {detail}")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        Self::Validation {
            detail: e.to_string(),
        }
    }
}

impl From<PatchError> for LedgerError {
    fn from(e: PatchError) -> Self {
        Self::Validation {
            detail: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PageNum;

    fn hash(c: char) -> CommitHash {
        CommitHash::new(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn conflict_carries_current_head() {
        let err = LedgerError::Conflict {
            page: PageKey::new(ProjectId(1), PageNum::FIRST),
            base: Some(hash('a')),
            current_head: Some(hash('b')),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.current_head(), Some(&hash('b')));
        let msg = err.to_string();
        assert!(msg.contains(&hash('b').to_string()));
        assert!(msg.contains("To fix"));
    }

    #[test]
    fn permission_message_names_required_role() {
        let err = LedgerError::Permission {
            user: UserId(9),
            project: ProjectId(1),
            role: Role::Member,
            op: Op::Promote,
        };
        assert!(err.to_string().contains("requires admin"));
        assert_eq!(err.current_head(), None);
    }

    #[test]
    fn patch_errors_are_validation_errors() {
        let err: LedgerError = PatchError::InvertedRange {
            old_start: 2,
            old_end: 1,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ErrorKind::NotFound).unwrap(), "\"not_found\"");
    }
}
