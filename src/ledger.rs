//! The [`Ledger`]: one object owning the store, access control and backend.
//!
//! Every request handler goes through this facade, which authorizes reads,
//! wires the pipeline and assembler to the store, and opens a tracing span
//! per operation.

use std::sync::Arc;

use tracing::instrument;

use crate::access::{AccessControl, Member};
use crate::assemble::{CommitView, PageAssembler};
use crate::clock::{Clock, SystemClock};
use crate::config::{BackendKind, StorageConfig};
use crate::error::LedgerError;
use crate::model::{Commit, CommitHash, Op, PageNum, ProjectId, Role, Tier, UserId};
use crate::pipeline::{PromotionPipeline, Transition};
use crate::storage::{FileBackend, MemoryBackend, StorageBackend};
use crate::store::{CommitStore, NewCommit, PageHeads};

/// A page ledger.
#[derive(Debug)]
pub struct Ledger {
    access: Arc<AccessControl>,
    store: CommitStore,
}

impl Ledger {
    /// Open a ledger over `backend`, loading all stored state.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if stored state cannot be loaded.
    pub fn open(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let access = Arc::new(AccessControl::open(Arc::clone(&backend))?);
        let store = CommitStore::open(backend, clock, Arc::clone(&access))?;
        Ok(Self { access, store })
    }

    /// An empty in-memory ledger on the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let access = Arc::new(AccessControl::empty(Arc::clone(&backend)));
        let store = CommitStore::empty(backend, Arc::new(SystemClock::new()), Arc::clone(&access));
        Self { access, store }
    }

    /// Open the backend named by `config`.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if the store cannot be opened.
    pub fn from_config(config: &StorageConfig) -> Result<Self, LedgerError> {
        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendKind::File => Arc::new(FileBackend::open(&config.path)?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        tracing::info!(backend = %config.backend, path = %config.path.display(), "opening ledger");
        Self::open(backend, Arc::new(SystemClock::new()))
    }

    /// The underlying commit store.
    #[must_use]
    pub const fn store(&self) -> &CommitStore {
        &self.store
    }

    /// The access control tables.
    #[must_use]
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    fn pipeline(&self) -> PromotionPipeline<'_> {
        PromotionPipeline::new(&self.store)
    }

    fn assembler(&self) -> PageAssembler<'_> {
        PageAssembler::new(&self.store)
    }

    fn read(&self, project: ProjectId, user: UserId) -> Result<(), LedgerError> {
        self.access.authorize(project, user, Op::Read).map(drop)
    }

    // -- projects & members -------------------------------------------------

    /// Register a project with `creator` as admin.
    ///
    /// # Errors
    /// See [`AccessControl::register_project`].
    #[instrument(skip_all, fields(%project, %creator))]
    pub fn create_project(&self, project: ProjectId, creator: UserId) -> Result<(), LedgerError> {
        self.access.register_project(project, creator)
    }

    /// Members of a project, sorted by user id.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project.
    #[instrument(skip_all, fields(%project, %user))]
    pub fn members(&self, project: ProjectId, user: UserId) -> Result<Vec<Member>, LedgerError> {
        self.read(project, user)?;
        self.access.members(project)
    }

    /// Add a member.
    ///
    /// # Errors
    /// See [`AccessControl::invite`].
    #[instrument(skip_all, fields(%project, %actor, %target, %role))]
    pub fn invite(&self, project: ProjectId, actor: UserId, target: UserId, role: Role) -> Result<(), LedgerError> {
        self.access.invite(project, actor, target, role)
    }

    /// Change a member's role.
    ///
    /// # Errors
    /// See [`AccessControl::set_role`].
    #[instrument(skip_all, fields(%project, %actor, %target, %role))]
    pub fn set_role(&self, project: ProjectId, actor: UserId, target: UserId, role: Role) -> Result<(), LedgerError> {
        self.access.set_role(project, actor, target, role)
    }

    /// Remove a member.
    ///
    /// # Errors
    /// See [`AccessControl::remove_member`].
    #[instrument(skip_all, fields(%project, %actor, %target))]
    pub fn remove_member(&self, project: ProjectId, actor: UserId, target: UserId) -> Result<(), LedgerError> {
        self.access.remove_member(project, actor, target)
    }

    // -- commits ------------------------------------------------------------

    /// Append a commit.
    ///
    /// # Errors
    /// See [`CommitStore::create_commit`].
    #[instrument(skip_all, fields(project = %request.project_id, page = request.page_num, %actor))]
    pub fn create_commit(&self, request: NewCommit, actor: UserId) -> Result<Commit, LedgerError> {
        self.store.create_commit(request, actor)
    }

    /// Push a LOCAL commit to DEVELOP.
    ///
    /// # Errors
    /// See [`PromotionPipeline::push`].
    #[instrument(skip_all, fields(%project, hash = %hash.short(), %actor))]
    pub fn push(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.pipeline().push(project, hash, actor)
    }

    /// Set the DEVELOP head.
    ///
    /// # Errors
    /// See [`PromotionPipeline::merge`].
    #[instrument(skip_all, fields(%project, hash = %hash.short(), %actor))]
    pub fn merge(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.pipeline().merge(project, hash, actor)
    }

    /// Publish the DEVELOP head as RELEASE.
    ///
    /// # Errors
    /// See [`PromotionPipeline::promote`].
    #[instrument(skip_all, fields(%project, hash = %hash.short(), %actor))]
    pub fn promote(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.pipeline().promote(project, hash, actor)
    }

    // -- reads --------------------------------------------------------------

    /// Page text at a tier's head.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project or an absent head.
    #[instrument(skip_all, fields(%project, page = %page_num, %tier))]
    pub fn content(&self, project: ProjectId, page_num: PageNum, tier: Tier, user: UserId) -> Result<String, LedgerError> {
        self.read(project, user)?;
        self.assembler().materialize(project, page_num, tier)
    }

    /// A commit with the text before and after it.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project or commit, or a
    /// commit of another project.
    #[instrument(skip_all, fields(%project, hash = %hash.short()))]
    pub fn show_commit(&self, project: ProjectId, hash: &CommitHash, user: UserId) -> Result<CommitView, LedgerError> {
        self.read(project, user)?;
        let view = self.assembler().commit_view(hash)?;
        if view.commit.project_id != project {
            return Err(LedgerError::not_found(format!("commit {hash} in project {project}")));
        }
        Ok(view)
    }

    /// Page text as of a commit.
    ///
    /// # Errors
    /// As [`Ledger::show_commit`].
    #[instrument(skip_all, fields(%project, hash = %hash.short()))]
    pub fn content_at(&self, project: ProjectId, hash: &CommitHash, user: UserId) -> Result<String, LedgerError> {
        self.read(project, user)?;
        if self.store.locate(hash)?.project_id != project {
            return Err(LedgerError::not_found(format!("commit {hash} in project {project}")));
        }
        self.assembler().materialize_at(hash)
    }

    /// Commits on one page at `tier`, latest first.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project.
    #[instrument(skip_all, fields(%project, page = %page_num, %tier))]
    pub fn list_commits(
        &self,
        project: ProjectId,
        page_num: PageNum,
        tier: Tier,
        user: UserId,
    ) -> Result<Vec<Commit>, LedgerError> {
        self.read(project, user)?;
        Ok(self.store.list_commits(project, page_num, tier))
    }

    /// Commits at `tier` across a page range.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project,
    /// [`LedgerError::Validation`] if `start > end`.
    #[instrument(skip_all, fields(%project, %tier, %start, %end))]
    pub fn search(
        &self,
        project: ProjectId,
        tier: Tier,
        start: PageNum,
        end: PageNum,
        user: UserId,
    ) -> Result<Vec<Commit>, LedgerError> {
        self.read(project, user)?;
        self.store.search(project, tier, start, end)
    }

    /// Highest page with a commit, `0` if none.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project.
    pub fn max_page(&self, project: ProjectId, user: UserId) -> Result<u32, LedgerError> {
        self.read(project, user)?;
        Ok(self.store.max_page(project))
    }

    /// Head pointers of a page.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project.
    pub fn heads(&self, project: ProjectId, page_num: PageNum, user: UserId) -> Result<PageHeads, LedgerError> {
        self.read(project, user)?;
        Ok(self.store.heads(project, page_num))
    }
}
