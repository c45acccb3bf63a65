//! pageledger library crate.
//!
//! A content-addressed commit ledger for paged documents. Each page of a
//! project carries a single-parent chain of line-range patches; commits move
//! through three tiers (`local → develop → release`) under role-based access
//! control, and any tier's text is rebuilt by replaying its chain.
//!
//! The `pageledger` binary (in `crates/pageledger-cli`) and the TCP server
//! are thin layers over [`Ledger`].

pub mod access;
pub mod api;
pub mod assemble;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod page;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use access::{AccessControl, Member, ProjectMembers};
pub use assemble::{CommitView, PageAssembler};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use model::{Commit, CommitHash, Op, PageKey, PageNum, ProjectId, Role, Tier, UserId};
pub use pipeline::{Outcome, PromotionPipeline, Transition};
pub use store::{CommitStore, NewCommit, PageHeads};
