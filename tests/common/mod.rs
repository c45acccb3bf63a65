//! Shared helpers for pageledger integration tests.
//!
//! Every ledger here runs on a deterministic clock, so hashes are stable
//! within a test. Project 1 is registered with an admin and a member.

#![allow(dead_code)]

use std::sync::Arc;

use pageledger::clock::ManualClock;
use pageledger::storage::{MemoryBackend, StorageBackend};
use pageledger::{Commit, CommitHash, Ledger, NewCommit, PageNum, ProjectId, Role, Tier, UserId};
use pageledger_patch::{Patch, diff};

pub const P: ProjectId = ProjectId(1);
pub const ADMIN: UserId = UserId(1);
pub const MEMBER: UserId = UserId(2);
pub const VIEWER: UserId = UserId(3);

pub fn page(n: u32) -> PageNum {
    PageNum::new(n).unwrap()
}

/// A ledger over `backend` with project 1 set up (if not already stored).
pub fn ledger_on(backend: Arc<dyn StorageBackend>) -> Ledger {
    let ledger = Ledger::open(backend, Arc::new(ManualClock::new(1_700_000_000_000, 1))).unwrap();
    if ledger.access().projects().is_empty() {
        ledger.create_project(P, ADMIN).unwrap();
        ledger.invite(P, ADMIN, MEMBER, Role::Member).unwrap();
    }
    ledger
}

/// A fresh in-memory ledger with project 1 set up.
pub fn ledger() -> Ledger {
    ledger_on(Arc::new(MemoryBackend::new()))
}

/// Commit an explicit patch as `MEMBER`.
pub fn commit_patch(ledger: &Ledger, n: u32, patch: Patch, base: Option<&CommitHash>) -> Commit {
    ledger
        .create_commit(NewCommit::new(P, page(n), patch, base.cloned()), MEMBER)
        .unwrap()
}

/// Commit `new_text` as the next version of page `n`, diffed against its
/// latest text.
pub fn commit_text(ledger: &Ledger, n: u32, new_text: &str) -> Commit {
    let latest = ledger.heads(P, page(n), MEMBER).unwrap().latest;
    let old_text = match &latest {
        Some(hash) => ledger.content_at(P, hash, MEMBER).unwrap(),
        None => String::new(),
    };
    commit_patch(ledger, n, diff(&old_text, new_text), latest.as_ref())
}

/// Push and merge `hash` as `MEMBER`.
pub fn push_merge(ledger: &Ledger, hash: &CommitHash) {
    ledger.push(P, hash, MEMBER).unwrap();
    ledger.merge(P, hash, MEMBER).unwrap();
}

/// Page text at `tier`, as the viewer sees it.
pub fn content(ledger: &Ledger, n: u32, tier: Tier) -> Result<String, pageledger::LedgerError> {
    ledger.content(P, page(n), tier, VIEWER)
}
