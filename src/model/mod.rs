//! Ledger data model: identifiers, tiers, roles and the commit record.

pub mod commit;
pub mod types;

pub use commit::{Commit, compute_hash};
pub use types::{
    CommitHash, ErrorKind, Op, PageKey, PageNum, ProjectId, Role, Tier, UserId, ValidationError,
};
