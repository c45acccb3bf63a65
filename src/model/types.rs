//! Core ledger types.
//!
//! Identifiers (projects, users, pages, commit hashes) and the closed
//! enumerations that drive the promotion pipeline: [`Tier`], [`Role`] and
//! [`Op`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProjectId / UserId
// ---------------------------------------------------------------------------

/// Numeric project identifier, issued by the project service outside the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

/// Numeric user identifier, issued by the auth service outside the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u64(ErrorKind::ProjectId, s).map(Self)
    }
}

impl FromStr for UserId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u64(ErrorKind::UserId, s).map(Self)
    }
}

fn parse_u64(kind: ErrorKind, s: &str) -> Result<u64, ValidationError> {
    s.parse().map_err(|e: std::num::ParseIntError| ValidationError {
        kind,
        value: s.to_owned(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// PageNum
// ---------------------------------------------------------------------------

/// A 1-based page number.
///
/// Deserializes from any JSON integer so that zero and negative page numbers
/// surface as a [`ValidationError`] rather than a type mismatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct PageNum(u32);

impl PageNum {
    /// The first page of every project.
    pub const FIRST: Self = Self(1);

    /// Create a page number, rejecting zero.
    ///
    /// # Errors
    /// Returns an error if `n` is zero.
    pub fn new(n: u32) -> Result<Self, ValidationError> {
        if n == 0 {
            return Err(ValidationError {
                kind: ErrorKind::PageNum,
                value: n.to_string(),
                reason: "page numbers start at 1".to_owned(),
            });
        }
        Ok(Self(n))
    }

    /// Return the raw page number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PageNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for PageNum {
    type Error = ValidationError;
    fn try_from(n: i64) -> Result<Self, Self::Error> {
        let raw = u32::try_from(n).map_err(|_| ValidationError {
            kind: ErrorKind::PageNum,
            value: n.to_string(),
            reason: "page numbers must be positive and fit in 32 bits".to_owned(),
        })?;
        Self::new(raw)
    }
}

impl From<PageNum> for u32 {
    fn from(page: PageNum) -> Self {
        page.0
    }
}

impl FromStr for PageNum {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s.parse().map_err(|e: std::num::ParseIntError| ValidationError {
            kind: ErrorKind::PageNum,
            value: s.to_owned(),
            reason: e.to_string(),
        })?;
        Self::try_from(n)
    }
}

/// A page within a project, the unit of locking and lineage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageKey {
    /// Owning project.
    pub project_id: ProjectId,
    /// Page within the project.
    pub page_num: PageNum,
}

impl PageKey {
    /// Build a page key.
    #[must_use]
    pub const fn new(project_id: ProjectId, page_num: PageNum) -> Self {
        Self {
            project_id,
            page_num,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project {} page {}", self.project_id, self.page_num)
    }
}

// ---------------------------------------------------------------------------
// CommitHash
// ---------------------------------------------------------------------------

/// A validated 64-character lowercase hex SHA-256 commit identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    /// Length of the hex encoding.
    pub const LEN: usize = 64;

    /// Create a new `CommitHash` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 64 lowercase hex characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 12 hex characters, for human-facing output.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    pub(crate) fn from_digest(bytes: &[u8]) -> Self {
        use fmt::Write as _;
        let mut hex = String::with_capacity(Self::LEN);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.len() != Self::LEN {
            return Err(ValidationError {
                kind: ErrorKind::CommitHash,
                value: s.to_owned(),
                reason: format!("expected {} hex characters, got {}", Self::LEN, s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ValidationError {
                kind: ErrorKind::CommitHash,
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitHash {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Visibility tier of a page's content.
///
/// Ordered `Local < Develop < Release`; commits only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Freshly created commits; the LOCAL head is the page's latest commit.
    Local,
    /// Pushed candidates; the DEVELOP head is set by merge.
    Develop,
    /// Published content; the RELEASE head is set by promote.
    Release,
}

impl Tier {
    /// All tiers in promotion order.
    pub const ALL: [Self; 3] = [Self::Local, Self::Develop, Self::Release];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Develop => "develop",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "develop" => Ok(Self::Develop),
            "release" => Ok(Self::Release),
            _ => Err(ValidationError {
                kind: ErrorKind::Tier,
                value: s.to_owned(),
                reason: "expected one of: local, develop, release".to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Role / Op
// ---------------------------------------------------------------------------

/// A user's role within a project. Ordered `Viewer < Member < Admin`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access; the role of anyone without a membership row.
    #[default]
    Viewer,
    /// May commit, push and merge.
    Member,
    /// May additionally promote and manage members.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => write!(f, "viewer"),
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError {
                kind: ErrorKind::Role,
                value: s.to_owned(),
                reason: "expected one of: admin, member, viewer".to_owned(),
            }),
        }
    }
}

/// An operation subject to role authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Materialize content, list or search commits.
    Read,
    /// Create a commit.
    Commit,
    /// Move a LOCAL commit to DEVELOP.
    Push,
    /// Set the DEVELOP head.
    Merge,
    /// Set the RELEASE head.
    Promote,
    /// Invite, remove or change the role of members.
    ManageMembers,
}

impl Op {
    /// The weakest role allowed to perform this operation.
    #[must_use]
    pub const fn required_role(self) -> Role {
        match self {
            Self::Read => Role::Viewer,
            Self::Commit | Self::Push | Self::Merge => Role::Member,
            Self::Promote | Self::ManageMembers => Role::Admin,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Commit => write!(f, "commit"),
            Self::Push => write!(f, "push"),
            Self::Merge => write!(f, "merge"),
            Self::Promote => write!(f, "promote"),
            Self::ManageMembers => write!(f, "manage members"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// What kind of value failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A project identifier.
    ProjectId,
    /// A user identifier.
    UserId,
    /// A page number.
    PageNum,
    /// A commit hash.
    CommitHash,
    /// A tier name.
    Tier,
    /// A role name.
    Role,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectId => write!(f, "project id"),
            Self::UserId => write!(f, "user id"),
            Self::PageNum => write!(f, "page number"),
            Self::CommitHash => write!(f, "commit hash"),
            Self::Tier => write!(f, "tier"),
            Self::Role => write!(f, "role"),
        }
    }
}

/// A validation error for ledger core types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?} ({})", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
