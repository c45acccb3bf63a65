//! Project membership and role-gated authorization.
//!
//! Each registered project owns a [`ProjectMembers`] table mapping users to
//! roles. Anyone without a row is a [`Role::Viewer`]. Membership changes are
//! serialized per project and persisted before they become visible; a table
//! never loses its last admin.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::model::{Op, ProjectId, Role, UserId};
use crate::storage::StorageBackend;

// ---------------------------------------------------------------------------
// ProjectMembers
// ---------------------------------------------------------------------------

/// The membership table of one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MembersFile", into = "MembersFile")]
pub struct ProjectMembers {
    /// The project this table belongs to.
    pub project_id: ProjectId,
    roles: BTreeMap<UserId, Role>,
}

impl ProjectMembers {
    /// A fresh table with a single admin.
    #[must_use]
    pub fn with_admin(project_id: ProjectId, admin: UserId) -> Self {
        Self {
            project_id,
            roles: BTreeMap::from([(admin, Role::Admin)]),
        }
    }

    /// The explicit role of `user`, if they have a row.
    #[must_use]
    pub fn get(&self, user: UserId) -> Option<Role> {
        self.roles.get(&user).copied()
    }

    /// The effective role of `user` (`viewer` when absent).
    #[must_use]
    pub fn role_of(&self, user: UserId) -> Role {
        self.get(user).unwrap_or_default()
    }

    /// Number of admins.
    #[must_use]
    pub fn admin_count(&self) -> usize {
        self.roles.values().filter(|r| **r == Role::Admin).count()
    }

    /// All rows, sorted by user id.
    #[must_use]
    pub fn entries(&self) -> Vec<Member> {
        self.roles
            .iter()
            .map(|(&user_id, &role)| Member { user_id, role })
            .collect()
    }

    /// `true` if dropping `user`'s admin role would leave no admin.
    fn is_last_admin(&self, user: UserId) -> bool {
        self.get(user) == Some(Role::Admin) && self.admin_count() == 1
    }
}

/// One membership row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The user.
    pub user_id: UserId,
    /// Their role in the project.
    pub role: Role,
}

/// On-disk shape of [`ProjectMembers`]: rows as a list rather than a map
/// keyed by numbers.
#[derive(Serialize, Deserialize)]
struct MembersFile {
    project_id: ProjectId,
    #[serde(default)]
    members: Vec<Member>,
}

impl From<MembersFile> for ProjectMembers {
    fn from(file: MembersFile) -> Self {
        Self {
            project_id: file.project_id,
            roles: file.members.into_iter().map(|m| (m.user_id, m.role)).collect(),
        }
    }
}

impl From<ProjectMembers> for MembersFile {
    fn from(members: ProjectMembers) -> Self {
        Self {
            project_id: members.project_id,
            members: members.entries(),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessControl
// ---------------------------------------------------------------------------

/// Role lookup and authorization for every registered project.
#[derive(Debug)]
pub struct AccessControl {
    backend: Arc<dyn StorageBackend>,
    projects: RwLock<HashMap<ProjectId, Arc<Mutex<ProjectMembers>>>>,
}

impl AccessControl {
    /// Load all membership tables from `backend`.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if the tables cannot be loaded, or if
    /// a stored table has no admin.
    pub fn open(backend: Arc<dyn StorageBackend>) -> Result<Self, LedgerError> {
        let mut projects = HashMap::new();
        for members in backend.load_projects()? {
            if members.admin_count() == 0 {
                return Err(LedgerError::storage(format!(
                    "project {} has no admin",
                    members.project_id
                )));
            }
            projects.insert(members.project_id, Arc::new(Mutex::new(members)));
        }
        Ok(Self {
            backend,
            projects: RwLock::new(projects),
        })
    }

    /// No projects, writing through to `backend`.
    #[must_use]
    pub fn empty(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `role` may perform `op`.
    #[must_use]
    pub fn check_transition(role: Role, op: Op) -> bool {
        role >= op.required_role()
    }

    /// Registered project ids, ascending.
    #[must_use]
    pub fn projects(&self) -> Vec<ProjectId> {
        let mut ids: Vec<_> = self
            .projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Register a project with `creator` as its first admin.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] if the project already exists, or
    /// [`LedgerError::Storage`] if the table cannot be written.
    pub fn register_project(&self, project: ProjectId, creator: UserId) -> Result<(), LedgerError> {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        if projects.contains_key(&project) {
            return Err(LedgerError::validation(format!(
                "project {project} is already registered"
            )));
        }
        let members = ProjectMembers::with_admin(project, creator);
        self.backend.write_project(&members)?;
        projects.insert(project, Arc::new(Mutex::new(members)));
        tracing::info!(%project, admin = %creator, "project registered");
        Ok(())
    }

    /// The role of `user` in `project`, `viewer` if they have no row.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] if the project is not registered.
    pub fn role_of(&self, project: ProjectId, user: UserId) -> Result<Role, LedgerError> {
        let table = self.table(project)?;
        let members = table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(members.role_of(user))
    }

    /// Resolve `user`'s role and check it allows `op`.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] for an unknown project,
    /// [`LedgerError::Permission`] if the role is insufficient.
    pub fn authorize(&self, project: ProjectId, user: UserId, op: Op) -> Result<Role, LedgerError> {
        let role = self.role_of(project, user)?;
        if !Self::check_transition(role, op) {
            tracing::debug!(%project, %user, %role, %op, "permission denied");
            return Err(LedgerError::Permission {
                user,
                project,
                role,
                op,
            });
        }
        Ok(role)
    }

    /// All members of `project`, sorted by user id.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] if the project is not registered.
    pub fn members(&self, project: ProjectId) -> Result<Vec<Member>, LedgerError> {
        let table = self.table(project)?;
        let members = table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(members.entries())
    }

    /// Change the role of an existing member.
    ///
    /// # Errors
    /// [`LedgerError::Permission`] unless `actor` is admin,
    /// [`LedgerError::NotFound`] if `target` has no row,
    /// [`LedgerError::Invariant`] if this would demote the last admin.
    pub fn set_role(
        &self,
        project: ProjectId,
        actor: UserId,
        target: UserId,
        role: Role,
    ) -> Result<(), LedgerError> {
        self.mutate(project, actor, |members| {
            let Some(current) = members.get(target) else {
                return Err(LedgerError::not_found(format!(
                    "member {target} of project {project}"
                )));
            };
            if current == role {
                return Ok(false);
            }
            if role != Role::Admin && members.is_last_admin(target) {
                return Err(LedgerError::Invariant {
                    detail: format!(
                        "user {target} is the last admin of project {project} and cannot become {role}"
                    ),
                });
            }
            members.roles.insert(target, role);
            tracing::info!(%project, %actor, %target, %role, "role changed");
            Ok(true)
        })
    }

    /// Add a new member.
    ///
    /// # Errors
    /// [`LedgerError::Permission`] unless `actor` is admin,
    /// [`LedgerError::Validation`] if `target` is already a member.
    pub fn invite(
        &self,
        project: ProjectId,
        actor: UserId,
        target: UserId,
        role: Role,
    ) -> Result<(), LedgerError> {
        self.mutate(project, actor, |members| {
            if let Some(existing) = members.get(target) {
                return Err(LedgerError::validation(format!(
                    "user {target} is already {existing} of project {project}; use set_role"
                )));
            }
            members.roles.insert(target, role);
            tracing::info!(%project, %actor, %target, %role, "member invited");
            Ok(true)
        })
    }

    /// Remove a member.
    ///
    /// # Errors
    /// [`LedgerError::Permission`] unless `actor` is admin,
    /// [`LedgerError::NotFound`] if `target` has no row,
    /// [`LedgerError::Invariant`] if `target` is the last admin.
    pub fn remove_member(
        &self,
        project: ProjectId,
        actor: UserId,
        target: UserId,
    ) -> Result<(), LedgerError> {
        self.mutate(project, actor, |members| {
            if members.get(target).is_none() {
                return Err(LedgerError::not_found(format!(
                    "member {target} of project {project}"
                )));
            }
            if members.is_last_admin(target) {
                return Err(LedgerError::Invariant {
                    detail: format!("user {target} is the last admin of project {project}"),
                });
            }
            members.roles.remove(&target);
            tracing::info!(%project, %actor, %target, "member removed");
            Ok(true)
        })
    }

    // -- internals ----------------------------------------------------------

    fn table(&self, project: ProjectId) -> Result<Arc<Mutex<ProjectMembers>>, LedgerError> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("project {project}")))
    }

    /// Run an admin-only change on a draft of the table; persist and publish
    /// it only if `change` succeeds and reports a modification.
    fn mutate(
        &self,
        project: ProjectId,
        actor: UserId,
        change: impl FnOnce(&mut ProjectMembers) -> Result<bool, LedgerError>,
    ) -> Result<(), LedgerError> {
        let table = self.table(project)?;
        let mut members = table.lock().unwrap_or_else(PoisonError::into_inner);

        let role = members.role_of(actor);
        if !Self::check_transition(role, Op::ManageMembers) {
            return Err(LedgerError::Permission {
                user: actor,
                project,
                role,
                op: Op::ManageMembers,
            });
        }

        let mut draft = members.clone();
        if change(&mut draft)? {
            debug_assert!(draft.admin_count() > 0);
            self.backend.write_project(&draft)?;
            *members = draft;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    const P: ProjectId = ProjectId(1);
    const ADMIN: UserId = UserId(1);
    const ALICE: UserId = UserId(2);
    const BOB: UserId = UserId(3);

    fn access() -> AccessControl {
        let access = AccessControl::open(Arc::new(MemoryBackend::new())).unwrap();
        access.register_project(P, ADMIN).unwrap();
        access
    }

    #[test]
    fn unknown_user_defaults_to_viewer() {
        assert_eq!(access().role_of(P, BOB).unwrap(), Role::Viewer);
    }

    #[test]
    fn unknown_project_is_not_found() {
        let err = access().role_of(ProjectId(99), ADMIN).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn register_twice_is_rejected() {
        let access = access();
        assert!(matches!(
            access.register_project(P, ALICE),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn transition_matrix() {
        use Op::{Commit, ManageMembers, Merge, Promote, Push, Read};
        let table = [
            (Role::Viewer, [true, false, false, false, false, false]),
            (Role::Member, [true, true, true, true, false, false]),
            (Role::Admin, [true, true, true, true, true, true]),
        ];
        for (role, expected) in table {
            for (op, want) in [Read, Commit, Push, Merge, Promote, ManageMembers].into_iter().zip(expected) {
                assert_eq!(AccessControl::check_transition(role, op), want, "{role} {op}");
            }
        }
    }

    #[test]
    fn invite_then_set_role() {
        let access = access();
        access.invite(P, ADMIN, ALICE, Role::Member).unwrap();
        assert_eq!(access.role_of(P, ALICE).unwrap(), Role::Member);
        access.set_role(P, ADMIN, ALICE, Role::Admin).unwrap();
        assert_eq!(access.role_of(P, ALICE).unwrap(), Role::Admin);
        assert_eq!(access.members(P).unwrap().len(), 2);
    }

    #[test]
    fn non_admin_cannot_manage() {
        let access = access();
        access.invite(P, ADMIN, ALICE, Role::Member).unwrap();
        let err = access.invite(P, ALICE, BOB, Role::Member).unwrap_err();
        assert!(matches!(err, LedgerError::Permission { op: Op::ManageMembers, .. }));
        let err = access.set_role(P, ALICE, ALICE, Role::Admin).unwrap_err();
        assert!(matches!(err, LedgerError::Permission { .. }));
    }

    #[test]
    fn last_admin_cannot_be_demoted_or_removed() {
        let access = access();
        let err = access.set_role(P, ADMIN, ADMIN, Role::Member).unwrap_err();
        assert!(matches!(err, LedgerError::Invariant { .. }));
        let err = access.remove_member(P, ADMIN, ADMIN).unwrap_err();
        assert!(matches!(err, LedgerError::Invariant { .. }));
        assert_eq!(access.role_of(P, ADMIN).unwrap(), Role::Admin);
    }

    #[test]
    fn admin_can_step_down_once_replaced() {
        let access = access();
        access.invite(P, ADMIN, ALICE, Role::Admin).unwrap();
        access.set_role(P, ADMIN, ADMIN, Role::Member).unwrap();
        assert_eq!(access.role_of(P, ADMIN).unwrap(), Role::Member);
        // ALICE is now the only admin.
        let err = access.remove_member(P, ALICE, ALICE).unwrap_err();
        assert!(matches!(err, LedgerError::Invariant { .. }));
    }

    #[test]
    fn duplicate_invite_and_missing_target() {
        let access = access();
        access.invite(P, ADMIN, ALICE, Role::Viewer).unwrap();
        assert!(matches!(
            access.invite(P, ADMIN, ALICE, Role::Member),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            access.set_role(P, ADMIN, BOB, Role::Member),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            access.remove_member(P, ADMIN, BOB),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn tables_survive_reopen() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        {
            let access = AccessControl::open(Arc::clone(&backend)).unwrap();
            access.register_project(P, ADMIN).unwrap();
            access.invite(P, ADMIN, ALICE, Role::Member).unwrap();
        }
        let access = AccessControl::open(backend).unwrap();
        assert_eq!(access.role_of(P, ALICE).unwrap(), Role::Member);
        assert_eq!(access.projects(), vec![P]);
    }
}
