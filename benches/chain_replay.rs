//! Chain replay benchmarks.
//!
//! Materializing a tier replays every patch from genesis, so cost grows with
//! chain length. This measures materialize and commit-creation (which
//! replays the parent) at a few chain lengths.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench chain_replay
//! ```

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use pageledger::clock::ManualClock;
use pageledger::storage::MemoryBackend;
use pageledger::{CommitHash, Ledger, NewCommit, PageNum, ProjectId, Tier, UserId};
use pageledger_patch::Patch;

const P: ProjectId = ProjectId(1);
const USER: UserId = UserId(1);

/// A ledger whose page 1 has a chain of `len` commits, each appending a line.
fn ledger_with_chain(len: usize) -> (Ledger, CommitHash) {
    let ledger = Ledger::open(Arc::new(MemoryBackend::new()), Arc::new(ManualClock::new(1, 1))).expect("bench setup");
    ledger.create_project(P, USER).expect("bench setup");
    let mut base = None;
    for i in 0..len {
        let patch = Patch::insert(i, vec![format!("line {i} of the page, with some text")]);
        let commit = ledger
            .create_commit(NewCommit::new(P, PageNum::FIRST, patch, base.take()), USER)
            .expect("bench setup");
        base = Some(commit.hash);
    }
    (ledger, base.expect("non-empty chain"))
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    for len in [10usize, 100, 1_000] {
        let (ledger, _) = ledger_with_chain(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| ledger.content(P, PageNum::FIRST, Tier::Local, USER).expect("materialize"));
        });
    }
    group.finish();
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_on_chain");
    for len in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || ledger_with_chain(len),
                |(ledger, head)| {
                    let patch = Patch::insert(0, vec!["new first line".to_owned()]);
                    ledger
                        .create_commit(NewCommit::new(P, PageNum::FIRST, patch, Some(head)), USER)
                        .expect("commit")
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_materialize, bench_commit);
criterion_main!(benches);
