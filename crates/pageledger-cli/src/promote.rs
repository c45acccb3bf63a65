use anyhow::{Context as _, Result};
use clap::Args;
use tracing::instrument;

use pageledger::{CommitHash, Outcome, ProjectId};

use crate::context::Context;

#[derive(Args)]
pub struct TransitionArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,

    /// Commit hash
    hash: CommitHash,
}

#[derive(Clone, Copy, Debug)]
pub enum Step {
    Push,
    Merge,
    Promote,
}

#[instrument(skip(ctx, args), fields(project = %args.project, hash = %args.hash.short()))]
pub fn run(ctx: &Context, step: Step, args: &TransitionArgs) -> Result<()> {
    let user = ctx.user()?;
    let ledger = ctx.ledger()?;
    let transition = match step {
        Step::Push => ledger.push(args.project, &args.hash, user),
        Step::Merge => ledger.merge(args.project, &args.hash, user),
        Step::Promote => ledger.promote(args.project, &args.hash, user),
    }
    .with_context(|| format!("{step:?} {} failed", args.hash.short()))?;

    ctx.emit(&transition, || match transition.outcome {
        Outcome::Applied => println!("{} is now {}", transition.hash.short(), transition.tier),
        Outcome::Unchanged => println!("{} already in place ({})", transition.hash.short(), transition.tier),
    })
}
