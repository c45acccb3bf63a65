//! Per-page ledger record: the commit arena and the tier head pointers.
//!
//! A [`PageRecord`] is the unit of locking and of persistence. Every
//! mutation goes through the methods below, which bump [`PageRecord::revision`]
//! so the store knows a draft must be written back.
//!
//! # Layout
//!
//! ```text
//! commits:   [genesis, c1, c2, c3]     creation order, append-only
//! positions: {hash → index}            rebuilt on load, never persisted
//! heads:     {local → c3, develop → c2, release → genesis}
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use pageledger_patch::Patch;

use crate::error::LedgerError;
use crate::model::{Commit, CommitHash, PageKey, Tier};

/// All commits and head pointers of one page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Which page this is.
    pub key: PageKey,
    /// Mutation counter, bumped by every change.
    #[serde(default)]
    pub revision: u64,
    /// Commits in creation order.
    #[serde(default)]
    commits: Vec<Commit>,
    /// Head pointer per tier. The `local` head is always the latest commit.
    #[serde(default)]
    heads: BTreeMap<Tier, CommitHash>,
    #[serde(skip)]
    positions: HashMap<CommitHash, usize>,
}

impl PageRecord {
    /// An empty page.
    #[must_use]
    pub fn new(key: PageKey) -> Self {
        Self {
            key,
            revision: 0,
            commits: Vec::new(),
            heads: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Rebuild the hash index and check structural invariants after loading.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if a commit belongs to another page,
    /// a hash repeats, a parent is missing, or a head points nowhere.
    pub fn reindex(&mut self) -> Result<(), LedgerError> {
        self.positions.clear();
        for (i, commit) in self.commits.iter().enumerate() {
            if commit.key() != self.key {
                return Err(LedgerError::storage(format!(
                    "{}: commit {} belongs to {}",
                    self.key,
                    commit.hash,
                    commit.key()
                )));
            }
            if let Some(parent) = &commit.parent_hash
                && !self.positions.contains_key(parent)
            {
                return Err(LedgerError::storage(format!(
                    "{}: commit {} references unknown parent {parent}",
                    self.key, commit.hash
                )));
            }
            if self.positions.insert(commit.hash.clone(), i).is_some() {
                return Err(LedgerError::storage(format!(
                    "{}: duplicate commit {}",
                    self.key, commit.hash
                )));
            }
        }
        for (tier, head) in &self.heads {
            if !self.positions.contains_key(head) {
                return Err(LedgerError::storage(format!(
                    "{}: {tier} head {head} is not a commit on this page",
                    self.key
                )));
            }
        }
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    /// `true` if the page has no commits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Number of commits on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Commits in creation order.
    #[must_use]
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Look up a commit on this page.
    #[must_use]
    pub fn get(&self, hash: &CommitHash) -> Option<&Commit> {
        self.positions.get(hash).map(|&i| &self.commits[i])
    }

    /// The head pointer for `tier`.
    #[must_use]
    pub fn head(&self, tier: Tier) -> Option<&CommitHash> {
        self.heads.get(&tier)
    }

    /// The page's most recently created commit.
    #[must_use]
    pub fn latest(&self) -> Option<&CommitHash> {
        self.head(Tier::Local)
    }

    /// The commits from genesis to `head`, in parent → child order.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] if `head` is not on this page, or
    /// [`LedgerError::Storage`] if the parent chain is broken.
    pub fn chain(&self, head: &CommitHash) -> Result<Vec<&Commit>, LedgerError> {
        let mut out = Vec::new();
        let mut cursor = Some(
            self.get(head)
                .ok_or_else(|| LedgerError::not_found(format!("commit {head} on {}", self.key)))?,
        );
        while let Some(commit) = cursor {
            if out.len() > self.commits.len() {
                return Err(LedgerError::storage(format!(
                    "{}: parent chain from {head} does not terminate",
                    self.key
                )));
            }
            out.push(commit);
            cursor = match &commit.parent_hash {
                None => None,
                Some(parent) => Some(self.get(parent).ok_or_else(|| {
                    LedgerError::storage(format!(
                        "{}: commit {} references unknown parent {parent}",
                        self.key, commit.hash
                    ))
                })?),
            };
        }
        out.reverse();
        Ok(out)
    }

    /// The patches from genesis to `head`, cloned so they can be replayed
    /// without holding the page lock.
    ///
    /// # Errors
    /// See [`PageRecord::chain`].
    pub fn chain_patches(&self, head: &CommitHash) -> Result<Vec<Patch>, LedgerError> {
        Ok(self
            .chain(head)?
            .into_iter()
            .map(|c| c.patch.clone())
            .collect())
    }

    /// `true` if `ancestor` is `descendant` or lies on its parent chain.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: &CommitHash, descendant: &CommitHash) -> bool {
        let mut cursor = self.get(descendant);
        let mut steps = 0;
        while let Some(commit) = cursor {
            if &commit.hash == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.commits.len() {
                return false;
            }
            cursor = commit.parent_hash.as_ref().and_then(|p| self.get(p));
        }
        false
    }

    // -- mutations ----------------------------------------------------------

    /// Append a new commit and make it the latest (`local` head).
    ///
    /// The caller guarantees the parent is the current latest commit.
    pub(crate) fn append(&mut self, commit: Commit) {
        debug_assert_eq!(commit.parent_hash.as_ref(), self.latest());
        self.positions.insert(commit.hash.clone(), self.commits.len());
        self.heads.insert(Tier::Local, commit.hash.clone());
        self.commits.push(commit);
        self.revision += 1;
    }

    /// Raise a commit's tier. Returns `false` if the commit is unknown.
    pub(crate) fn set_tier(&mut self, hash: &CommitHash, tier: Tier) -> bool {
        let Some(&i) = self.positions.get(hash) else {
            return false;
        };
        debug_assert!(self.commits[i].tier <= tier, "tiers only move forward");
        self.commits[i].tier = tier;
        self.revision += 1;
        true
    }

    /// Point the `tier` head at `hash`, returning the previous head.
    pub(crate) fn set_head(&mut self, tier: Tier, hash: CommitHash) -> Option<CommitHash> {
        debug_assert!(self.positions.contains_key(&hash));
        self.revision += 1;
        self.heads.insert(tier, hash)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
