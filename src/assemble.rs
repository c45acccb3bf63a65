//! Rebuild page text by replaying a commit chain.

use serde::{Deserialize, Serialize};

use pageledger_patch::{Patch, join};

use crate::error::LedgerError;
use crate::model::{Commit, CommitHash, PageKey, PageNum, ProjectId, Tier};
use crate::store::CommitStore;

/// A commit together with the page text before and after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitView {
    /// The commit.
    pub commit: Commit,
    /// Text at the parent (empty for a genesis commit).
    pub before: String,
    /// Text at this commit.
    pub after: String,
}

/// Apply `patches` in order over an empty page.
///
/// # Errors
/// Returns [`LedgerError::Storage`] if a stored patch does not fit: the
/// chain was validated on write, so this means the record is corrupt.
pub(crate) fn replay(patches: &[Patch]) -> Result<Vec<String>, LedgerError> {
    let mut lines = Vec::new();
    for (i, patch) in patches.iter().enumerate() {
        patch
            .apply_in_place(&mut lines)
            .map_err(|e| LedgerError::storage(format!("replaying patch {i} of {}: {e}", patches.len())))?;
    }
    Ok(lines)
}

/// Materializes page text at a tier or at a commit.
///
/// Patches are cloned under the page lock and replayed after it is
/// released.
#[derive(Debug, Clone, Copy)]
pub struct PageAssembler<'a> {
    store: &'a CommitStore,
}

impl<'a> PageAssembler<'a> {
    /// An assembler reading from `store`.
    #[must_use]
    pub const fn new(store: &'a CommitStore) -> Self {
        Self { store }
    }

    /// The page text at `tier`'s head.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] if the page has no head at `tier`.
    pub fn materialize(&self, project: ProjectId, page_num: PageNum, tier: Tier) -> Result<String, LedgerError> {
        let key = PageKey::new(project, page_num);
        let patches = self.store.with_page(key, |page| {
            let head = page
                .head(tier)
                .ok_or_else(|| LedgerError::not_found(format!("{tier} head of {key}")))?;
            page.chain_patches(head)
        })?;
        Ok(join(&replay(&patches)?))
    }

    /// The page text as of `hash`.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown hash.
    pub fn materialize_at(&self, hash: &CommitHash) -> Result<String, LedgerError> {
        let key = self.store.locate(hash)?;
        let patches = self.store.with_page(key, |page| page.chain_patches(hash))?;
        Ok(join(&replay(&patches)?))
    }

    /// A commit with the text before and after it.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown hash.
    pub fn commit_view(&self, hash: &CommitHash) -> Result<CommitView, LedgerError> {
        let key = self.store.locate(hash)?;
        let (commit, patches) = self.store.with_page(key, |page| {
            let commit = page
                .get(hash)
                .cloned()
                .ok_or_else(|| LedgerError::not_found(format!("commit {hash}")))?;
            Ok((commit, page.chain_patches(hash)?))
        })?;

        let Some((last, earlier)) = patches.split_last() else {
            return Err(LedgerError::storage(format!("commit {hash} has an empty chain")));
        };
        let mut lines = replay(earlier)?;
        let before = join(&lines);
        last.apply_in_place(&mut lines)
            .map_err(|e| LedgerError::storage(format!("replaying {hash}: {e}")))?;
        Ok(CommitView {
            commit,
            before,
            after: join(&lines),
        })
    }
}
