//! Wire contract: request shapes, reply shapes and error kinds as clients
//! see them through `Service::handle_line`.

use std::sync::Arc;

use serde_json::{Value, json};

use pageledger::Ledger;
use pageledger::api::Service;

fn service() -> Service {
    let service = Service::new(Arc::new(Ledger::in_memory()));
    let out = call(&service, json!({"user": 1, "op": "create_project", "project": 1}));
    assert_eq!(out, json!({"ok": {"status": "created"}}));
    let out = call(&service, json!({"user": 1, "op": "invite", "project": 1, "target": 2, "role": "member"}));
    assert_eq!(out, json!({"ok": {"status": "ok"}}));
    service
}

fn call(service: &Service, request: Value) -> Value {
    serde_json::from_str(&service.handle_line(&request.to_string())).unwrap()
}

fn commit(service: &Service, user: u64, lines: &[&str], range: (i64, i64), base: Option<&str>) -> Value {
    call(
        service,
        json!({
            "user": user, "op": "commit", "project": 1, "page": 1,
            "title": "edit", "description": "",
            "patch": {"old_start": range.0, "old_end": range.1, "new_lines": lines},
            "base": base,
        }),
    )
}

fn hash_of(reply: &Value) -> String {
    reply["ok"]["hash"].as_str().unwrap().to_owned()
}

#[test]
fn full_pipeline_over_the_wire() {
    let service = service();
    let v1 = hash_of(&commit(&service, 2, &["# v1"], (0, 0), None));
    assert_eq!(v1.len(), 64);

    for op in ["push", "merge"] {
        let out = call(&service, json!({"user": 2, "op": op, "project": 1, "hash": v1}));
        assert_eq!(out["ok"]["status"], "applied");
        assert_eq!(out["ok"]["tier"], "develop");
    }
    let out = call(&service, json!({"user": 2, "op": "merge", "project": 1, "hash": v1}));
    assert_eq!(out["ok"]["status"], "unchanged");

    let out = call(&service, json!({"user": 1, "op": "promote", "project": 1, "hash": v1}));
    assert_eq!(out["ok"], json!({"status": "applied", "hash": v1, "tier": "release"}));

    let out = call(&service, json!({"user": 9, "op": "content", "project": 1, "page": 1, "mode": "release"}));
    assert_eq!(out, json!({"ok": {"content": "# v1"}}));

    let out = call(&service, json!({"user": 9, "op": "heads", "project": 1, "page": 1}));
    assert_eq!(out["ok"]["heads"], json!({"latest": v1, "develop": v1, "release": v1}));

    let out = call(&service, json!({"user": 9, "op": "max_page", "project": 1}));
    assert_eq!(out, json!({"ok": {"max_page": 1}}));

    let out = call(&service, json!({"user": 9, "op": "search", "project": 1, "tier": "release", "start": 1, "end": 5}));
    let commits = out["ok"]["commits"].as_array().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0]["hash"], v1.as_str());
    assert_eq!(commits[0]["tier"], "release");
    assert!(commits[0].get("parent_hash").is_none(), "genesis has no parent field");
}

#[test]
fn error_kinds() {
    let service = service();
    let v1 = hash_of(&commit(&service, 2, &["a"], (0, 0), None));

    // conflict, with the head to re-fetch
    let out = commit(&service, 2, &["b"], (0, 0), None);
    assert_eq!(out["err"]["kind"], "conflict");
    assert_eq!(out["err"]["current_head"], v1.as_str());

    // validation: patch outside the parent
    let out = commit(&service, 2, &["b"], (3, 4), Some(&v1));
    assert_eq!(out["err"]["kind"], "validation");
    let out = commit(&service, 2, &["b"], (-1, 0), Some(&v1));
    assert_eq!(out["err"]["kind"], "validation");

    // permission: viewers cannot commit or promote
    let out = commit(&service, 9, &["b"], (1, 1), Some(&v1));
    assert_eq!(out["err"]["kind"], "permission");
    let out = call(&service, json!({"user": 2, "op": "promote", "project": 1, "hash": v1}));
    assert_eq!(out["err"]["kind"], "permission");

    // state: merge before push
    let out = call(&service, json!({"user": 2, "op": "merge", "project": 1, "hash": v1}));
    assert_eq!(out["err"]["kind"], "state");

    // not_found: unknown commit, project, absent head
    let unknown = "0".repeat(64);
    let out = call(&service, json!({"user": 2, "op": "push", "project": 1, "hash": unknown}));
    assert_eq!(out["err"]["kind"], "not_found");
    let out = call(&service, json!({"user": 2, "op": "members", "project": 42}));
    assert_eq!(out["err"]["kind"], "not_found");
    let out = call(&service, json!({"user": 2, "op": "content", "project": 1, "page": 1, "tier": "release"}));
    assert_eq!(out["err"]["kind"], "not_found");

    // invariant: last admin
    let out = call(&service, json!({"user": 1, "op": "remove_member", "project": 1, "target": 1}));
    assert_eq!(out["err"]["kind"], "invariant");

    // parse: malformed hash, unknown op, bad JSON
    let out = call(&service, json!({"user": 2, "op": "push", "project": 1, "hash": "xyz"}));
    assert_eq!(out["err"]["kind"], "parse");
    let out: Value = serde_json::from_str(&service.handle_line("]")).unwrap();
    assert_eq!(out["err"]["kind"], "parse");
}

#[test]
fn search_range_must_be_ordered() {
    let service = service();
    let out = call(&service, json!({"user": 1, "op": "search", "project": 1, "tier": "local", "start": 3, "end": 1}));
    assert_eq!(out["err"]["kind"], "validation");
    let out = call(&service, json!({"user": 1, "op": "max_page", "project": 1}));
    assert_eq!(out["ok"]["max_page"], 0);
}

#[test]
fn show_commit_and_log() {
    let service = service();
    let v1 = hash_of(&commit(&service, 2, &["one", "two"], (0, 0), None));
    let v2 = hash_of(&commit(&service, 2, &["2"], (1, 2), Some(&v1)));

    let out = call(&service, json!({"user": 9, "op": "show_commit", "project": 1, "hash": v2}));
    assert_eq!(out["ok"]["before"], "one\ntwo");
    assert_eq!(out["ok"]["after"], "one\n2");
    assert_eq!(out["ok"]["commit"]["parent_hash"], v1.as_str());
    assert_eq!(out["ok"]["commit"]["patch"], json!({"old_start": 1, "old_end": 2, "new_lines": ["2"]}));

    let out = call(&service, json!({"user": 9, "op": "log", "project": 1, "page": 1, "tier": "local"}));
    let hashes: Vec<_> = out["ok"]["commits"].as_array().unwrap().iter().map(|c| c["hash"].clone()).collect();
    assert_eq!(hashes, vec![json!(v2), json!(v1)]);

    let out = call(&service, json!({"user": 1, "op": "members", "project": 1}));
    assert_eq!(
        out["ok"]["members"],
        json!([{"user_id": 1, "role": "admin"}, {"user_id": 2, "role": "member"}])
    );
}
