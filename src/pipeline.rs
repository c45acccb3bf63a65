//! Tier transitions: push, merge, promote.
//!
//! ```text
//! NONE ─commit→ LOCAL ─push→ DEVELOP candidate ─merge→ DEVELOP head ─promote→ RELEASE head
//! ```
//!
//! Each transition resolves the commit (`NotFound`), authorizes the actor
//! (`Permission`) and then checks the commit's state (`State`), in that
//! order, inside a single page transaction.

use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::error::LedgerError;
use crate::model::{CommitHash, Op, PageKey, ProjectId, Tier, UserId};
use crate::page::PageRecord;
use crate::store::CommitStore;

/// Whether a transition changed anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The transition was applied.
    Applied,
    /// The commit was already where the transition would put it.
    Unchanged,
}

/// Result of a push, merge or promote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The commit that was moved.
    pub hash: CommitHash,
    /// Its tier afterwards.
    pub tier: Tier,
    /// Whether anything changed.
    pub outcome: Outcome,
}

/// Drives commits through the tiers.
#[derive(Debug, Clone, Copy)]
pub struct PromotionPipeline<'a> {
    store: &'a CommitStore,
    access: &'a AccessControl,
}

impl<'a> PromotionPipeline<'a> {
    /// A pipeline over `store`, authorizing against the store's access control.
    #[must_use]
    pub fn new(store: &'a CommitStore) -> Self {
        Self {
            store,
            access: store.access(),
        }
    }

    /// Move a LOCAL commit to DEVELOP. The DEVELOP head does not move.
    ///
    /// # Errors
    /// `NotFound`, `Permission` (viewers) or `State` if the commit is no
    /// longer LOCAL.
    pub fn push(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.transition(project, hash, actor, Op::Push, |page, tier| {
            if tier != Tier::Local {
                return Err(state(hash, tier, "only local commits can be pushed", None));
            }
            page.set_tier(hash, Tier::Develop);
            Ok(applied(hash, Tier::Develop))
        })
    }

    /// Make a DEVELOP commit the page's DEVELOP head. The last merge wins;
    /// merging the current head again changes nothing.
    ///
    /// # Errors
    /// `NotFound`, `Permission` (viewers) or `State` if the commit was never
    /// pushed.
    pub fn merge(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.transition(project, hash, actor, Op::Merge, |page, tier| {
            if page.head(Tier::Develop) == Some(hash) {
                return Ok(unchanged(hash, tier));
            }
            if tier != Tier::Develop {
                return Err(state(
                    hash,
                    tier,
                    "only pushed (develop) commits can be merged",
                    page.head(Tier::Develop).cloned(),
                ));
            }
            let previous = page.set_head(Tier::Develop, hash.clone());
            if let Some(previous) = &previous
                && !page.is_ancestor(previous, hash)
            {
                tracing::warn!(
                    page = %page.key,
                    merged = %hash.short(),
                    replaced = %previous.short(),
                    "merged commit does not descend from the previous develop head"
                );
            }
            Ok(applied(hash, Tier::Develop))
        })
    }

    /// Publish the current DEVELOP head as the RELEASE head.
    ///
    /// # Errors
    /// `NotFound`, `Permission` (non-admins) or `State` carrying the DEVELOP
    /// head if `hash` is not it.
    pub fn promote(&self, project: ProjectId, hash: &CommitHash, actor: UserId) -> Result<Transition, LedgerError> {
        self.transition(project, hash, actor, Op::Promote, |page, tier| {
            if page.head(Tier::Release) == Some(hash) {
                return Ok(unchanged(hash, tier));
            }
            let develop = page.head(Tier::Develop).cloned();
            if develop.as_ref() != Some(hash) {
                return Err(state(
                    hash,
                    tier,
                    "only the current develop head can be promoted",
                    develop,
                ));
            }
            page.set_tier(hash, Tier::Release);
            page.set_head(Tier::Release, hash.clone());
            Ok(applied(hash, Tier::Release))
        })
    }

    fn transition(
        &self,
        project: ProjectId,
        hash: &CommitHash,
        actor: UserId,
        op: Op,
        step: impl FnOnce(&mut PageRecord, Tier) -> Result<Transition, LedgerError>,
    ) -> Result<Transition, LedgerError> {
        let key = self.resolve(project, hash)?;
        self.access.authorize(project, actor, op)?;
        let transition = self.store.transact(key, |page| {
            let tier = page
                .get(hash)
                .map(|c| c.tier)
                .ok_or_else(|| LedgerError::not_found(format!("commit {hash}")))?;
            step(page, tier)
        })?;
        tracing::info!(
            page = %key,
            %op,
            hash = %hash.short(),
            tier = %transition.tier,
            outcome = ?transition.outcome,
            "transition"
        );
        Ok(transition)
    }

    /// The page of `hash`, which must belong to `project`.
    fn resolve(&self, project: ProjectId, hash: &CommitHash) -> Result<PageKey, LedgerError> {
        let key = self.store.locate(hash)?;
        if key.project_id != project {
            return Err(LedgerError::not_found(format!("commit {hash} in project {project}")));
        }
        Ok(key)
    }
}

fn applied(hash: &CommitHash, tier: Tier) -> Transition {
    Transition {
        hash: hash.clone(),
        tier,
        outcome: Outcome::Applied,
    }
}

fn unchanged(hash: &CommitHash, tier: Tier) -> Transition {
    Transition {
        hash: hash.clone(),
        tier,
        outcome: Outcome::Unchanged,
    }
}

fn state(hash: &CommitHash, tier: Tier, reason: &str, current_head: Option<CommitHash>) -> LedgerError {
    LedgerError::State {
        hash: hash.clone(),
        tier,
        reason: reason.to_owned(),
        current_head,
    }
}
