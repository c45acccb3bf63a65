//! Concurrent commits: distinct pages never contend, and racing writers on
//! one page admit exactly one winner per base.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{MEMBER, P, VIEWER, ledger, page};
use pageledger::{LedgerError, NewCommit, Tier};
use pageledger_patch::Patch;

const THREADS: u32 = 8;
const ROUNDS: u32 = 20;

#[test]
fn distinct_pages_all_succeed() {
    let ledger = Arc::new(ledger());
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (1..=THREADS)
        .map(|n| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut base = None;
                for round in 0..ROUNDS {
                    let patch = Patch::insert(round as usize, vec![format!("page {n} line {round}")]);
                    let commit = ledger
                        .create_commit(NewCommit::new(P, page(n), patch, base.take()), MEMBER)
                        .unwrap();
                    base = Some(commit.hash);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for n in 1..=THREADS {
        let text = ledger.content(P, page(n), Tier::Local, VIEWER).unwrap();
        assert_eq!(text.lines().count(), ROUNDS as usize);
        assert!(text.starts_with(&format!("page {n} line 0")));
        assert_eq!(ledger.list_commits(P, page(n), Tier::Local, VIEWER).unwrap().len(), ROUNDS as usize);
    }
    assert_eq!(ledger.max_page(P, VIEWER).unwrap(), THREADS);
}

#[test]
fn one_winner_per_base() {
    let ledger = Arc::new(ledger());

    for round in 0..ROUNDS {
        let base = ledger.heads(P, page(1), VIEWER).unwrap().latest;
        let barrier = Arc::new(Barrier::new(THREADS as usize));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                let base = base.clone();
                thread::spawn(move || {
                    let patch = Patch::insert(round as usize, vec![format!("round {round} by {t}")]);
                    barrier.wait();
                    ledger.create_commit(NewCommit::new(P, page(1), patch, base), MEMBER)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {round}: exactly one commit lands");

        let winner = &winners[0].hash;
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(err, LedgerError::Conflict { .. }));
                assert_eq!(err.current_head(), Some(winner));
            }
        }
    }

    let text = ledger.content(P, page(1), Tier::Local, VIEWER).unwrap();
    assert_eq!(text.lines().count(), ROUNDS as usize);
}
