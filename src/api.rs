//! Request/response contract.
//!
//! One JSON object per request, tagged by `op` and carrying the acting
//! `user`. Every response is either `{"ok": …}` or
//! `{"err": {"kind", "message", "current_head"?}}`.
//!
//! ```text
//! {"user":1,"op":"commit","project":1,"page":1,"patch":{"old_start":0,"old_end":0,"new_lines":["# v1"]}}
//! {"ok":{"hash":"3f2a…"}}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pageledger_patch::RawPatch;

use crate::access::Member;
use crate::assemble::CommitView;
use crate::error::{ErrorKind, LedgerError};
use crate::ledger::Ledger;
use crate::model::{Commit, CommitHash, PageNum, ProjectId, Role, Tier, UserId};
use crate::pipeline::{Outcome, Transition};
use crate::store::{NewCommit, PageHeads};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request from an authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The acting user, as established by the caller's auth layer.
    pub user: UserId,
    /// What to do.
    #[serde(flatten)]
    pub command: Command,
}

/// Ledger operations. Page numbers travel as signed integers so that a bad
/// one is reported as a validation error rather than a parse error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    // === Projects & members ===
    /// Register a project with the user as admin.
    CreateProject { project: ProjectId },
    /// List members.
    Members { project: ProjectId },
    /// Add a member.
    Invite {
        project: ProjectId,
        target: UserId,
        role: Role,
    },
    /// Change a member's role.
    SetRole {
        project: ProjectId,
        target: UserId,
        role: Role,
    },
    /// Remove a member.
    RemoveMember { project: ProjectId, target: UserId },

    // === Commits ===
    /// Append a commit to a page.
    Commit {
        project: ProjectId,
        page: i64,
        #[serde(default)]
        title: String,
        #[serde(default)]
        description: String,
        patch: RawPatch,
        #[serde(default)]
        base: Option<CommitHash>,
    },
    /// LOCAL → DEVELOP.
    Push { project: ProjectId, hash: CommitHash },
    /// Set the DEVELOP head.
    Merge { project: ProjectId, hash: CommitHash },
    /// Set the RELEASE head.
    Promote { project: ProjectId, hash: CommitHash },

    // === Reads ===
    /// Page text at a tier.
    Content {
        project: ProjectId,
        page: i64,
        #[serde(alias = "mode")]
        tier: Tier,
    },
    /// A commit with the text before and after it.
    ShowCommit { project: ProjectId, hash: CommitHash },
    /// Commits on one page at a tier, latest first.
    Log {
        project: ProjectId,
        page: i64,
        #[serde(alias = "mode")]
        tier: Tier,
    },
    /// Commits at a tier across a page range.
    Search {
        project: ProjectId,
        #[serde(alias = "mode")]
        tier: Tier,
        start: i64,
        end: i64,
    },
    /// Highest page with a commit.
    MaxPage { project: ProjectId },
    /// Head pointers of a page.
    Heads { project: ProjectId, page: i64 },
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A response line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Success.
    Ok { ok: Reply },
    /// Failure.
    Err { err: ErrorPayload },
}

impl Response {
    /// A success response.
    #[must_use]
    pub const fn ok(reply: Reply) -> Self {
        Self::Ok { ok: reply }
    }

    /// A failure response.
    pub fn err(error: impl Into<ErrorPayload>) -> Self {
        Self::Err { err: error.into() }
    }

    /// A `parse` failure for a request that could not be decoded.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::Err {
            err: ErrorPayload {
                kind: ErrorKind::Parse,
                message: message.into(),
                current_head: None,
            },
        }
    }

    /// `true` for a success response.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Successful response payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// A membership or registration change succeeded.
    Status { status: &'static str },
    /// A commit was created.
    Created { hash: CommitHash },
    /// A tier transition ran.
    Transition {
        status: Outcome,
        hash: CommitHash,
        tier: Tier,
    },
    /// Page text.
    Content { content: String },
    /// Commit detail.
    CommitView(CommitView),
    /// Commit listing.
    Commits { commits: Vec<Commit> },
    /// Highest page with a commit.
    MaxPage { max_page: u32 },
    /// Head pointers.
    Heads { heads: PageHeads },
    /// Membership listing.
    Members { members: Vec<Member> },
}

impl From<Transition> for Reply {
    fn from(t: Transition) -> Self {
        Self::Transition {
            status: t.outcome,
            hash: t.hash,
            tier: t.tier,
        }
    }
}

/// Error payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable class.
    pub kind: ErrorKind,
    /// Human-readable message with a fix hint.
    pub message: String,
    /// The head to re-fetch after a conflict or state error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_head: Option<CommitHash>,
}

impl From<LedgerError> for ErrorPayload {
    fn from(e: LedgerError) -> Self {
        Self {
            kind: e.kind(),
            current_head: e.current_head().cloned(),
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decode a request line.
///
/// # Errors
/// Returns the `serde_json` error for malformed JSON or unknown operations.
pub fn decode_request(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line)
}

/// Encode a response as a single line without the trailing newline.
#[must_use]
pub fn encode_response(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        let message = e.to_string().replace('"', "\\\"");
        format!(r#"{{"err":{{"kind":"storage","message":"encoding response: {message}"}}}}"#)
    })
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Dispatches requests to a shared [`Ledger`].
#[derive(Debug, Clone)]
pub struct Service {
    ledger: Arc<Ledger>,
}

impl Service {
    /// A service over `ledger`.
    #[must_use]
    pub const fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// The ledger requests are dispatched to.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Decode, dispatch and encode one request line.
    #[must_use]
    pub fn handle_line(&self, line: &str) -> String {
        let response = match decode_request(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                tracing::debug!(error = %e, "undecodable request");
                Response::parse_error(e.to_string())
            }
        };
        encode_response(&response)
    }

    /// Dispatch one request.
    #[must_use]
    pub fn handle(&self, request: Request) -> Response {
        match self.dispatch(request) {
            Ok(reply) => Response::ok(reply),
            Err(e) => {
                tracing::debug!(kind = %e.kind(), "request failed");
                Response::err(e)
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Reply, LedgerError> {
        let ledger = &*self.ledger;
        let user = request.user;
        let done = Reply::Status { status: "ok" };
        Ok(match request.command {
            Command::CreateProject { project } => {
                ledger.create_project(project, user)?;
                Reply::Status { status: "created" }
            }
            Command::Members { project } => Reply::Members {
                members: ledger.members(project, user)?,
            },
            Command::Invite { project, target, role } => {
                ledger.invite(project, user, target, role)?;
                done
            }
            Command::SetRole { project, target, role } => {
                ledger.set_role(project, user, target, role)?;
                done
            }
            Command::RemoveMember { project, target } => {
                ledger.remove_member(project, user, target)?;
                done
            }
            Command::Commit {
                project,
                page,
                title,
                description,
                patch,
                base,
            } => {
                let request = NewCommit {
                    project_id: project,
                    page_num: page,
                    title,
                    description,
                    patch,
                    base,
                };
                Reply::Created {
                    hash: ledger.create_commit(request, user)?.hash,
                }
            }
            Command::Push { project, hash } => ledger.push(project, &hash, user)?.into(),
            Command::Merge { project, hash } => ledger.merge(project, &hash, user)?.into(),
            Command::Promote { project, hash } => ledger.promote(project, &hash, user)?.into(),
            Command::Content { project, page, tier } => Reply::Content {
                content: ledger.content(project, PageNum::try_from(page)?, tier, user)?,
            },
            Command::ShowCommit { project, hash } => {
                Reply::CommitView(ledger.show_commit(project, &hash, user)?)
            }
            Command::Log { project, page, tier } => Reply::Commits {
                commits: ledger.list_commits(project, PageNum::try_from(page)?, tier, user)?,
            },
            Command::Search {
                project,
                tier,
                start,
                end,
            } => Reply::Commits {
                commits: ledger.search(
                    project,
                    tier,
                    PageNum::try_from(start)?,
                    PageNum::try_from(end)?,
                    user,
                )?,
            },
            Command::MaxPage { project } => Reply::MaxPage {
                max_page: ledger.max_page(project, user)?,
            },
            Command::Heads { project, page } => Reply::Heads {
                heads: ledger.heads(project, PageNum::try_from(page)?, user)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn call(service: &Service, request: &Value) -> Value {
        serde_json::from_str(&service.handle_line(&request.to_string())).unwrap()
    }

    #[test]
    fn decode_commit_request() {
        let request = decode_request(
            r#"{"user":5,"op":"commit","project":1,"page":2,"patch":{"old_start":0,"old_end":0,"new_lines":["x"]}}"#,
        )
        .unwrap();
        assert_eq!(request.user, UserId(5));
        assert!(matches!(request.command, Command::Commit { page: 2, base: None, .. }));
    }

    #[test]
    fn mode_is_an_alias_for_tier() {
        let request = decode_request(r#"{"user":1,"op":"content","project":1,"page":1,"mode":"release"}"#).unwrap();
        assert!(matches!(request.command, Command::Content { tier: Tier::Release, .. }));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let service = Service::new(Arc::new(Ledger::in_memory()));
        let out: Value = serde_json::from_str(&service.handle_line("{nope")).unwrap();
        assert_eq!(out["err"]["kind"], "parse");
        let out = call(&service, &json!({"user": 1, "op": "explode"}));
        assert_eq!(out["err"]["kind"], "parse");
    }

    #[test]
    fn bad_page_is_validation_not_parse() {
        let service = Service::new(Arc::new(Ledger::in_memory()));
        call(&service, &json!({"user": 1, "op": "create_project", "project": 1}));
        let out = call(&service, &json!({"user": 1, "op": "content", "project": 1, "page": -3, "tier": "local"}));
        assert_eq!(out["err"]["kind"], "validation");
    }

    #[test]
    fn commit_round_trip_over_lines() {
        let service = Service::new(Arc::new(Ledger::in_memory()));
        let out = call(&service, &json!({"user": 1, "op": "create_project", "project": 1}));
        assert_eq!(out["ok"]["status"], "created");

        let out = call(
            &service,
            &json!({"user": 1, "op": "commit", "project": 1, "page": 1, "title": "v1",
                    "patch": {"old_start": 0, "old_end": 0, "new_lines": ["# v1"]}}),
        );
        let hash = out["ok"]["hash"].as_str().unwrap().to_owned();

        let out = call(&service, &json!({"user": 1, "op": "push", "project": 1, "hash": hash}));
        assert_eq!(out["ok"], json!({"status": "applied", "hash": hash, "tier": "develop"}));

        let out = call(&service, &json!({"user": 1, "op": "show_commit", "project": 1, "hash": hash}));
        assert_eq!(out["ok"]["after"], "# v1");
        assert_eq!(out["ok"]["commit"]["title"], "v1");
    }

    #[test]
    fn conflict_carries_current_head() {
        let service = Service::new(Arc::new(Ledger::in_memory()));
        call(&service, &json!({"user": 1, "op": "create_project", "project": 1}));
        let commit = json!({"user": 1, "op": "commit", "project": 1, "page": 1,
                            "patch": {"old_start": 0, "old_end": 0, "new_lines": ["a"]}});
        let first = call(&service, &commit);
        let out = call(&service, &commit);
        assert_eq!(out["err"]["kind"], "conflict");
        assert_eq!(out["err"]["current_head"], first["ok"]["hash"]);
    }
}
