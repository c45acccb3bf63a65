//! The commit store: per-page commit arenas behind per-page locks.
//!
//! # Locking
//!
//! ```text
//! pages  RwLock<HashMap<PageKey, Arc<Mutex<PageRecord>>>>   lookup / insert only
//! index  RwLock<HashMap<CommitHash, PageKey>>               lookup / insert only
//! page   Mutex<PageRecord>                                  whole transaction
//! ```
//!
//! The map locks are released before a page mutex is taken. A page mutex may
//! be held while inserting into `index`, never the other way round.
//!
//! # Transactions
//!
//! [`CommitStore::transact`] clones the page into a draft, runs the change on
//! it, writes the draft through the backend and only then swaps it in. A
//! failing check or a failing write leaves no trace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use pageledger_patch::{Patch, RawPatch};

use crate::access::AccessControl;
use crate::assemble;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::model::{Commit, CommitHash, Op, PageKey, PageNum, ProjectId, Tier, UserId, compute_hash};
use crate::page::PageRecord;
use crate::storage::StorageBackend;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// A request to append a commit to a page.
///
/// Page number and patch arrive in wire form; both are validated under the
/// page lock after the actor's role has been checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommit {
    /// Target project.
    pub project_id: ProjectId,
    /// Target page, must be `>= 1`.
    pub page_num: i64,
    /// Short summary.
    #[serde(default)]
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// The edit, relative to the text at `base`.
    pub patch: RawPatch,
    /// The commit the client diffed against; `None` for an empty page.
    #[serde(default)]
    pub base: Option<CommitHash>,
}

impl NewCommit {
    /// A request with empty title and description.
    #[must_use]
    pub fn new(project_id: ProjectId, page_num: PageNum, patch: Patch, base: Option<CommitHash>) -> Self {
        Self {
            project_id,
            page_num: i64::from(page_num.get()),
            title: String::new(),
            description: String::new(),
            patch: patch.into(),
            base,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Head pointers of one page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHeads {
    /// The most recently created commit (LOCAL head).
    pub latest: Option<CommitHash>,
    /// The DEVELOP head.
    pub develop: Option<CommitHash>,
    /// The RELEASE head.
    pub release: Option<CommitHash>,
}

impl PageHeads {
    /// The head for `tier`.
    #[must_use]
    pub const fn get(&self, tier: Tier) -> Option<&CommitHash> {
        match tier {
            Tier::Local => self.latest.as_ref(),
            Tier::Develop => self.develop.as_ref(),
            Tier::Release => self.release.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommitStore
// ---------------------------------------------------------------------------

type Slot = Arc<Mutex<PageRecord>>;

/// All pages of all projects.
#[derive(Debug)]
pub struct CommitStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    access: Arc<AccessControl>,
    pages: RwLock<HashMap<PageKey, Slot>>,
    index: RwLock<HashMap<CommitHash, PageKey>>,
}

impl CommitStore {
    /// Load every page from `backend` and rebuild the hash index.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if a page cannot be loaded or a hash
    /// appears on two pages.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        access: Arc<AccessControl>,
    ) -> Result<Self, LedgerError> {
        let mut pages = HashMap::new();
        let mut index = HashMap::new();
        let mut commits = 0usize;
        for page in backend.load_pages()? {
            for commit in page.commits() {
                if let Some(other) = index.insert(commit.hash.clone(), page.key) {
                    return Err(LedgerError::storage(format!(
                        "commit {} appears on both {other} and {}",
                        commit.hash, page.key
                    )));
                }
            }
            commits += page.len();
            pages.insert(page.key, Arc::new(Mutex::new(page)));
        }
        tracing::debug!(pages = pages.len(), commits, "commit store loaded");
        Ok(Self {
            backend,
            clock,
            access,
            pages: RwLock::new(pages),
            index: RwLock::new(index),
        })
    }

    /// No pages, writing through to `backend`.
    #[must_use]
    pub fn empty(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>, access: Arc<AccessControl>) -> Self {
        Self {
            backend,
            clock,
            access,
            pages: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// The access control this store authorizes commits against.
    #[must_use]
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // -- locking primitives -------------------------------------------------

    fn slot(&self, key: PageKey) -> Option<Slot> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn slot_or_insert(&self, key: PageKey) -> Slot {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            pages
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(PageRecord::new(key)))),
        )
    }

    /// Drop a slot that never received a commit, unless another caller still
    /// holds it.
    fn release_vacant(&self, key: PageKey, slot: &Slot) {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = pages.get(&key) else {
            return;
        };
        // The map and `slot` are the only holders; nobody can clone it while
        // the map is write-locked, so the page mutex is free.
        if Arc::ptr_eq(current, slot)
            && Arc::strong_count(slot) == 2
            && slot.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
        {
            pages.remove(&key);
        }
    }

    /// Slots of every page of `project`, sorted by page number.
    fn project_slots(&self, project: ProjectId) -> Vec<(PageNum, Slot)> {
        let mut slots: Vec<_> = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.project_id == project)
            .map(|(key, slot)| (key.page_num, Arc::clone(slot)))
            .collect();
        slots.sort_by_key(|(page, _)| *page);
        slots
    }

    /// Run `f` on the page under its lock, read-only.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] if the page has never been written,
    /// or whatever `f` returns.
    pub fn with_page<T>(
        &self,
        key: PageKey,
        f: impl FnOnce(&PageRecord) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let slot = self
            .slot(key)
            .ok_or_else(|| LedgerError::not_found(key.to_string()))?;
        let page = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if page.is_empty() {
            return Err(LedgerError::not_found(key.to_string()));
        }
        f(&*page)
    }

    /// Run a change on a draft of the page; persist and publish the draft if
    /// the change succeeds and modified it.
    ///
    /// # Errors
    /// Whatever `f` returns, or [`LedgerError::Storage`] if the write fails.
    pub fn transact<T>(
        &self,
        key: PageKey,
        f: impl FnOnce(&mut PageRecord) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let slot = self.slot_or_insert(key);
        let mut page = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut draft = page.clone();
        let out = f(&mut draft);
        if draft.revision == page.revision {
            let vacant = page.is_empty();
            drop(page);
            if vacant {
                self.release_vacant(key, &slot);
            }
            return out;
        }
        let out = out?;

        self.backend.write_page(&draft)?;
        let added: Vec<CommitHash> = draft.commits()[page.len()..]
            .iter()
            .map(|c| c.hash.clone())
            .collect();
        *page = draft;

        if !added.is_empty() {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            for hash in added {
                index.insert(hash, key);
            }
        }
        Ok(out)
    }

    /// The page a commit lives on.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown hash.
    pub fn locate(&self, hash: &CommitHash) -> Result<PageKey, LedgerError> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .copied()
            .ok_or_else(|| LedgerError::not_found(format!("commit {hash}")))
    }

    // -- operations ---------------------------------------------------------

    /// Append a commit to a page.
    ///
    /// Checks, in order: the actor may commit, the page number is positive,
    /// `base` is the page's latest commit, and the patch fits the parent text.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unregistered project,
    /// [`LedgerError::Permission`] for viewers,
    /// [`LedgerError::Validation`] for a bad page number or patch,
    /// [`LedgerError::Conflict`] if `base` is stale,
    /// [`LedgerError::Storage`] if the write fails.
    pub fn create_commit(&self, request: NewCommit, actor: UserId) -> Result<Commit, LedgerError> {
        let project_id = request.project_id;
        self.access.authorize(project_id, actor, Op::Commit)?;
        let page_num = PageNum::try_from(request.page_num)?;
        let key = PageKey::new(project_id, page_num);

        self.transact(key, |page| {
            let latest = page.latest().cloned();
            if request.base != latest {
                return Err(LedgerError::Conflict {
                    page: key,
                    base: request.base,
                    current_head: latest,
                });
            }

            let patch = Patch::try_from(request.patch)?;
            let parent_lines = match &latest {
                Some(head) => assemble::replay(&page.chain_patches(head)?)?,
                None => Vec::new(),
            };
            // `[""]` and `[]` both render as the empty text; only `[]` survives
            // a read-diff-commit round trip.
            if patch.apply(&parent_lines)? == [""] {
                return Err(LedgerError::validation(format!(
                    "patch would leave {key} as a single empty line. To fix: delete the line to empty the page"
                )));
            }

            let timestamp = self.clock.now_ms();
            let hash = compute_hash(key, latest.as_ref(), &patch, actor, timestamp);
            let commit = Commit {
                hash,
                project_id,
                page_num,
                parent_hash: latest,
                patch,
                title: request.title,
                description: request.description,
                author_id: actor,
                timestamp,
                tier: Tier::Local,
            };
            page.append(commit.clone());
            tracing::info!(
                page = %key,
                hash = %commit.hash.short(),
                parent = commit.parent_hash.as_ref().map_or("-", CommitHash::short),
                "commit created"
            );
            Ok(commit)
        })
    }

    /// Fetch a commit by hash.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown hash.
    pub fn get_commit(&self, hash: &CommitHash) -> Result<Commit, LedgerError> {
        let key = self.locate(hash)?;
        self.with_page(key, |page| {
            page.get(hash)
                .cloned()
                .ok_or_else(|| LedgerError::not_found(format!("commit {hash}")))
        })
    }

    /// Commits on a page whose tier equals `tier`, latest first. An unknown
    /// page has no commits.
    #[must_use]
    pub fn list_commits(&self, project: ProjectId, page_num: PageNum, tier: Tier) -> Vec<Commit> {
        let Some(slot) = self.slot(PageKey::new(project, page_num)) else {
            return Vec::new();
        };
        let page = slot.lock().unwrap_or_else(PoisonError::into_inner);
        tier_filter(&page, tier)
    }

    /// Commits at `tier` across pages `start..=end`, page ascending, then
    /// latest first.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] if `start > end`.
    pub fn search(
        &self,
        project: ProjectId,
        tier: Tier,
        start: PageNum,
        end: PageNum,
    ) -> Result<Vec<Commit>, LedgerError> {
        if start > end {
            return Err(LedgerError::validation(format!(
                "page range {start}..={end} is empty: start must not exceed end"
            )));
        }
        let mut out = Vec::new();
        for (page_num, slot) in self.project_slots(project) {
            if page_num < start || page_num > end {
                continue;
            }
            let page = slot.lock().unwrap_or_else(PoisonError::into_inner);
            out.extend(tier_filter(&page, tier));
        }
        Ok(out)
    }

    /// The highest page of `project` with at least one commit, `0` if none.
    #[must_use]
    pub fn max_page(&self, project: ProjectId) -> u32 {
        self.project_slots(project)
            .into_iter()
            .rev()
            .find(|(_, slot)| !slot.lock().unwrap_or_else(PoisonError::into_inner).is_empty())
            .map_or(0, |(page_num, _)| page_num.get())
    }

    /// Head pointers of a page; all `None` for an unknown page.
    #[must_use]
    pub fn heads(&self, project: ProjectId, page_num: PageNum) -> PageHeads {
        let Some(slot) = self.slot(PageKey::new(project, page_num)) else {
            return PageHeads::default();
        };
        let page = slot.lock().unwrap_or_else(PoisonError::into_inner);
        PageHeads {
            latest: page.latest().cloned(),
            develop: page.head(Tier::Develop).cloned(),
            release: page.head(Tier::Release).cloned(),
        }
    }
}

fn tier_filter(page: &PageRecord, tier: Tier) -> Vec<Commit> {
    page.commits()
        .iter()
        .rev()
        .filter(|c| c.tier == tier)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
