//! End-to-end promotion scenarios: commit → push → merge → promote, and the
//! failures each step must produce.

mod common;

use common::{ADMIN, MEMBER, P, VIEWER, commit_patch, commit_text, content, ledger, page, push_merge};
use pageledger::{LedgerError, Outcome, Role, Tier};
use pageledger_patch::Patch;

#[test]
fn scenario_v1_then_v2() {
    let ledger = ledger();

    // v1: genesis on an empty page.
    let v1 = commit_patch(&ledger, 1, Patch::insert(0, vec!["# v1".into()]), None);
    assert!(v1.is_genesis());
    push_merge(&ledger, &v1.hash);
    assert_eq!(content(&ledger, 1, Tier::Develop).unwrap(), "# v1");
    assert!(matches!(content(&ledger, 1, Tier::Release), Err(LedgerError::NotFound { .. })));

    ledger.promote(P, &v1.hash, ADMIN).unwrap();
    assert_eq!(content(&ledger, 1, Tier::Release).unwrap(), "# v1");

    // v2 replaces the single line.
    let v2 = commit_patch(&ledger, 1, Patch::new(0, 1, vec!["# v2".into()]).unwrap(), Some(&v1.hash));
    assert_eq!(v2.parent_hash.as_ref(), Some(&v1.hash));
    push_merge(&ledger, &v2.hash);
    assert_eq!(content(&ledger, 1, Tier::Develop).unwrap(), "# v2");
    assert_eq!(content(&ledger, 1, Tier::Release).unwrap(), "# v1");
    assert_eq!(content(&ledger, 1, Tier::Local).unwrap(), "# v2");
}

#[test]
fn stale_client_gets_conflict_with_latest() {
    let ledger = ledger();
    let v1 = commit_text(&ledger, 1, "# title\nbody");

    // Two clients both diff against v1.
    let first = commit_patch(&ledger, 1, Patch::new(1, 2, vec!["first".into()]).unwrap(), Some(&v1.hash));
    let err = ledger
        .create_commit(
            pageledger::NewCommit::new(P, page(1), Patch::new(1, 2, vec!["second".into()]).unwrap(), Some(v1.hash)),
            MEMBER,
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict { .. }));
    assert_eq!(err.current_head(), Some(&first.hash));
    assert_eq!(content(&ledger, 1, Tier::Local).unwrap(), "# title\nfirst");
}

#[test]
fn blank_page_round_trips_through_read_and_diff() {
    let ledger = ledger();
    let err = ledger
        .create_commit(pageledger::NewCommit::new(P, page(1), Patch::insert(0, vec![String::new()]), None), MEMBER)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation { .. }));

    // The empty genesis materializes as "" and diffs cleanly from there.
    let empty = commit_patch(&ledger, 1, Patch::insert(0, Vec::new()), None);
    assert_eq!(ledger.content_at(P, &empty.hash, VIEWER).unwrap(), "");
    for text in ["x", "x\n", "", "\n\nend"] {
        let commit = commit_text(&ledger, 1, text);
        assert_eq!(ledger.content_at(P, &commit.hash, VIEWER).unwrap(), text);
    }
}

#[test]
fn merge_is_idempotent() {
    let ledger = ledger();
    let a = commit_text(&ledger, 1, "a");
    ledger.push(P, &a.hash, MEMBER).unwrap();
    let first = ledger.merge(P, &a.hash, MEMBER).unwrap();
    let second = ledger.merge(P, &a.hash, MEMBER).unwrap();
    assert_eq!(first.outcome, Outcome::Applied);
    assert_eq!(second.outcome, Outcome::Unchanged);
    assert_eq!(ledger.heads(P, page(1), VIEWER).unwrap().develop, Some(a.hash));
}

#[test]
fn promoting_a_non_head_leaves_release_untouched() {
    let ledger = ledger();
    let a = commit_text(&ledger, 1, "a");
    push_merge(&ledger, &a.hash);
    ledger.promote(P, &a.hash, ADMIN).unwrap();

    let b = commit_text(&ledger, 1, "b");
    let c = commit_text(&ledger, 1, "c");
    push_merge(&ledger, &b.hash);
    ledger.push(P, &c.hash, MEMBER).unwrap();

    let err = ledger.promote(P, &c.hash, ADMIN).unwrap_err();
    assert!(matches!(err, LedgerError::State { .. }));
    assert_eq!(err.current_head(), Some(&b.hash));
    assert!(err.to_string().contains("To fix"));

    let heads = ledger.heads(P, page(1), VIEWER).unwrap();
    assert_eq!(heads.release, Some(a.hash));
    assert_eq!(content(&ledger, 1, Tier::Release).unwrap(), "a");
}

#[test]
fn promotion_never_changes_materialized_text() {
    let ledger = ledger();
    let a = commit_text(&ledger, 1, "one\ntwo");
    let b = commit_text(&ledger, 1, "one\n2\nthree");
    let at_b = ledger.content_at(P, &b.hash, VIEWER).unwrap();

    push_merge(&ledger, &a.hash);
    push_merge(&ledger, &b.hash);
    ledger.promote(P, &b.hash, ADMIN).unwrap();

    assert_eq!(ledger.content_at(P, &b.hash, VIEWER).unwrap(), at_b);
    assert_eq!(content(&ledger, 1, Tier::Release).unwrap(), at_b);
}

#[test]
fn roles_gate_each_step() {
    let ledger = ledger();
    assert!(matches!(
        ledger.create_commit(
            pageledger::NewCommit::new(P, page(1), Patch::insert(0, vec!["x".into()]), None),
            VIEWER
        ),
        Err(LedgerError::Permission { role: Role::Viewer, .. })
    ));

    let a = commit_text(&ledger, 1, "x");
    assert!(matches!(ledger.push(P, &a.hash, VIEWER), Err(LedgerError::Permission { .. })));
    push_merge(&ledger, &a.hash);
    assert!(matches!(ledger.promote(P, &a.hash, MEMBER), Err(LedgerError::Permission { .. })));

    // Viewers read every tier.
    ledger.promote(P, &a.hash, ADMIN).unwrap();
    assert_eq!(content(&ledger, 1, Tier::Release).unwrap(), "x");
}

#[test]
fn log_and_search_follow_tiers() {
    let ledger = ledger();
    let a = commit_text(&ledger, 1, "a");
    let b = commit_text(&ledger, 2, "b");
    let c = commit_text(&ledger, 2, "c");
    ledger.push(P, &a.hash, MEMBER).unwrap();
    ledger.push(P, &c.hash, MEMBER).unwrap();

    let develop: Vec<_> = ledger
        .search(P, Tier::Develop, page(1), page(2), VIEWER)
        .unwrap()
        .into_iter()
        .map(|c| c.hash)
        .collect();
    assert_eq!(develop, vec![a.hash, c.hash]);

    let local = ledger.list_commits(P, page(2), Tier::Local, VIEWER).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].hash, b.hash);
    assert_eq!(ledger.max_page(P, VIEWER).unwrap(), 2);
}

#[test]
fn last_admin_is_protected() {
    let ledger = ledger();
    assert!(matches!(
        ledger.set_role(P, ADMIN, ADMIN, Role::Viewer),
        Err(LedgerError::Invariant { .. })
    ));
    assert!(matches!(ledger.remove_member(P, ADMIN, ADMIN), Err(LedgerError::Invariant { .. })));

    ledger.set_role(P, ADMIN, MEMBER, Role::Admin).unwrap();
    ledger.remove_member(P, MEMBER, ADMIN).unwrap();
    let members = ledger.members(P, VIEWER).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!((members[0].user_id, members[0].role), (MEMBER, Role::Admin));
}

#[test]
fn show_commit_rejects_other_projects() {
    let ledger = ledger();
    let a = commit_text(&ledger, 1, "a");
    ledger.create_project(pageledger::ProjectId(2), ADMIN).unwrap();
    assert!(matches!(
        ledger.show_commit(pageledger::ProjectId(2), &a.hash, ADMIN),
        Err(LedgerError::NotFound { .. })
    ));
    let view = ledger.show_commit(P, &a.hash, VIEWER).unwrap();
    assert_eq!((view.before.as_str(), view.after.as_str()), ("", "a"));
}
