//! The commit record and its content-addressed identity.
//!
//! A commit's hash covers `(project_id, page_num, parent_hash, patch,
//! author_id, timestamp)`. Title and description are presentation only and
//! may be edited by future tooling without changing identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pageledger_patch::Patch;

use super::types::{CommitHash, PageKey, PageNum, ProjectId, Tier, UserId};

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// One entry in a page's ledger.
///
/// Immutable once created except for `tier`, which only moves forward
/// (`local → develop → release`) as the commit is promoted in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Content-addressed identifier.
    pub hash: CommitHash,
    /// Owning project.
    pub project_id: ProjectId,
    /// Target page.
    pub page_num: PageNum,
    /// Predecessor on this page, `None` for the page's genesis commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<CommitHash>,
    /// The edit relative to the parent's materialized text.
    pub patch: Patch,
    /// Short summary.
    #[serde(default)]
    pub title: String,
    /// Longer free-form description.
    #[serde(default)]
    pub description: String,
    /// Who created the commit.
    pub author_id: UserId,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Highest tier the commit currently occupies.
    pub tier: Tier,
}

impl Commit {
    /// The page this commit belongs to.
    #[must_use]
    pub const fn key(&self) -> PageKey {
        PageKey::new(self.project_id, self.page_num)
    }

    /// `true` for the first commit on a page.
    #[must_use]
    pub const fn is_genesis(&self) -> bool {
        self.parent_hash.is_none()
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Compute a commit hash.
///
/// Algorithm: SHA-256 over newline-framed fields
/// `project \n page \n parent-or-empty \n author \n timestamp \n
/// old_start-old_end \n` followed by each replacement line as
/// `<byte-len>:<line>\n`. Length prefixes keep lines containing newlines or
/// colons from colliding with the framing.
#[must_use]
pub fn compute_hash(
    key: PageKey,
    parent_hash: Option<&CommitHash>,
    patch: &Patch,
    author_id: UserId,
    timestamp: u64,
) -> CommitHash {
    let mut hasher = Sha256::new();

    hasher.update(key.project_id.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(key.page_num.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(parent_hash.map_or("", CommitHash::as_str).as_bytes());
    hasher.update(b"\n");
    hasher.update(author_id.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(format!("{}-{}", patch.old_start(), patch.old_end()).as_bytes());
    hasher.update(b"\n");
    for line in patch.new_lines() {
        hasher.update(line.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    CommitHash::from_digest(&hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
