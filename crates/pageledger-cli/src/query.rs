use anyhow::Result;
use clap::Args;

use pageledger::{Commit, CommitHash, PageNum, ProjectId, Tier};

use crate::context::Context;

#[derive(Args)]
pub struct ContentArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,
    /// Page number
    #[arg(long)]
    page: PageNum,
    /// Tier to read
    #[arg(long, default_value = "release")]
    tier: Tier,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,
    /// Commit hash
    hash: CommitHash,
}

#[derive(Args)]
pub struct LogArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,
    /// Page number
    #[arg(long)]
    page: PageNum,
    /// Only commits currently at this tier
    #[arg(long, default_value = "local")]
    tier: Tier,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,
    /// Only commits currently at this tier
    #[arg(long, default_value = "local")]
    tier: Tier,
    /// First page (inclusive)
    #[arg(long, default_value = "1")]
    start: PageNum,
    /// Last page (inclusive; default: the highest page with commits)
    #[arg(long)]
    end: Option<PageNum>,
}

#[derive(Args)]
pub struct HeadsArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,
    /// Page number; omit to print the highest page with commits
    #[arg(long)]
    page: Option<PageNum>,
}

pub fn content(ctx: &Context, args: &ContentArgs) -> Result<()> {
    let user = ctx.user()?;
    let text = ctx.ledger()?.content(args.project, args.page, args.tier, user)?;
    ctx.emit(&serde_json::json!({ "content": text }), || println!("{text}"))
}

pub fn show(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let user = ctx.user()?;
    let view = ctx.ledger()?.show_commit(args.project, &args.hash, user)?;
    ctx.emit(&view, || {
        print_commit(&view.commit);
        println!();
        println!("--- before");
        println!("{}", view.before);
        println!("+++ after");
        println!("{}", view.after);
    })
}

pub fn log(ctx: &Context, args: &LogArgs) -> Result<()> {
    let user = ctx.user()?;
    let commits = ctx.ledger()?.list_commits(args.project, args.page, args.tier, user)?;
    ctx.emit(&commits, || print_commits(&commits))
}

pub fn search(ctx: &Context, args: &SearchArgs) -> Result<()> {
    let user = ctx.user()?;
    let ledger = ctx.ledger()?;
    let end = match args.end {
        Some(end) => end,
        None => match PageNum::new(ledger.max_page(args.project, user)?) {
            Ok(end) => end,
            // No pages yet.
            Err(_) => return ctx.emit(&Vec::<Commit>::new(), || println!("(no commits)")),
        },
    };
    let commits = ledger.search(args.project, args.tier, args.start, end, user)?;
    ctx.emit(&commits, || print_commits(&commits))
}

pub fn heads(ctx: &Context, args: &HeadsArgs) -> Result<()> {
    let user = ctx.user()?;
    let ledger = ctx.ledger()?;
    let Some(page) = args.page else {
        let max_page = ledger.max_page(args.project, user)?;
        return ctx.emit(&serde_json::json!({ "max_page": max_page }), || {
            println!("max page: {max_page}");
        });
    };
    let heads = ledger.heads(args.project, page, user)?;
    ctx.emit(&heads, || {
        for tier in Tier::ALL {
            let head = heads.get(tier).map_or("-", CommitHash::as_str);
            println!("{tier:<8} {head}");
        }
    })
}

fn print_commit(commit: &Commit) {
    println!("commit {}", commit.hash);
    if let Some(parent) = &commit.parent_hash {
        println!("parent {parent}");
    }
    println!("page   {} / {}", commit.project_id, commit.page_num);
    println!("author {}  at {} ms  tier {}", commit.author_id, commit.timestamp, commit.tier);
    if !commit.title.is_empty() {
        println!("\n    {}", commit.title);
    }
    if !commit.description.is_empty() {
        for line in commit.description.lines() {
            println!("    {line}");
        }
    }
}

fn print_commits(commits: &[Commit]) {
    if commits.is_empty() {
        println!("(no commits)");
    }
    for commit in commits {
        println!(
            "{}  page {:<4} {:<8} {}",
            commit.hash.short(),
            commit.page_num,
            commit.tier,
            commit.title
        );
    }
}
