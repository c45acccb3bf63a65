use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use serde_json::json;
use tracing::instrument;

use pageledger::{CommitHash, NewCommit, PageNum, ProjectId, Tier};
use pageledger_patch::{Patch, diff, hunks, lines};

use crate::context::Context;

#[derive(Args)]
pub struct CommitArgs {
    /// Project id
    #[arg(long)]
    project: ProjectId,

    /// Page number (starting at 1)
    #[arg(long)]
    page: PageNum,

    /// File holding the new text. With --start/--end, only the replacement
    /// lines.
    #[arg(long)]
    file: PathBuf,

    /// Short summary
    #[arg(long, short = 'm', default_value = "")]
    title: String,

    /// Longer description
    #[arg(long, default_value = "")]
    description: String,

    /// First replaced line (0-based); takes the patch range explicitly
    /// instead of diffing against the latest text
    #[arg(long, requires = "end")]
    start: Option<usize>,

    /// End of the replaced range (exclusive)
    #[arg(long, requires = "start")]
    end: Option<usize>,

    /// Commit the edit was made against (default: the page's latest)
    #[arg(long)]
    base: Option<CommitHash>,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Original file
    old: PathBuf,
    /// Edited file
    new: PathBuf,
}

/// Record a commit.
///
/// Without an explicit range, the file is diffed against the page's latest
/// text and the commit is based on the latest commit. A concurrent writer
/// between the read and the write surfaces as a conflict.
#[instrument(skip_all, fields(project = %args.project, page = %args.page))]
pub fn run(ctx: &Context, args: &CommitArgs) -> Result<()> {
    let user = ctx.user()?;
    let ledger = ctx.ledger()?;
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let (patch, base) = match (args.start, args.end) {
        (Some(start), Some(end)) => {
            let base = match &args.base {
                Some(base) => Some(base.clone()),
                None => ledger.heads(args.project, args.page, user)?.latest,
            };
            (Patch::new(start, end, lines(&text))?, base)
        }
        _ => {
            let latest = ledger.heads(args.project, args.page, user)?.latest;
            let base = args.base.clone().or(latest);
            let current = match &base {
                Some(hash) => ledger.content_at(args.project, hash, user)?,
                None => String::new(),
            };
            let patch = diff(&current, &text);
            if patch.is_noop() {
                bail!(
                    "{} matches page {} of project {}; nothing to commit",
                    args.file.display(),
                    args.page,
                    args.project
                );
            }
            (patch, base)
        }
    };

    let request = NewCommit::new(args.project, args.page, patch, base)
        .titled(args.title.clone())
        .described(args.description.clone());
    let commit = ledger.create_commit(request, user).context("commit rejected")?;

    ctx.emit(&commit, || {
        println!("{} {} page {} ({})", commit.hash, commit.project_id, commit.page_num, Tier::Local);
        println!(
            "  lines {}..{} replaced by {} line(s)",
            commit.patch.old_start(),
            commit.patch.old_end(),
            commit.patch.new_lines().len()
        );
    })
}

/// Print the single-range patch between two files, noting when the edit
/// spans several hunks.
pub fn run_diff(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let old = std::fs::read_to_string(&args.old).with_context(|| format!("reading {}", args.old.display()))?;
    let new = std::fs::read_to_string(&args.new).with_context(|| format!("reading {}", args.new.display()))?;
    let patch = diff(&old, &new);
    let hunk_count = hunks(&lines(&old), &lines(&new)).len();

    ctx.emit(&json!({ "patch": patch, "hunks": hunk_count }), || {
        if patch.is_noop() {
            println!("(no changes)");
            return;
        }
        println!("@@ {}..{} @@", patch.old_start(), patch.old_end());
        let old_lines = lines(&old);
        for line in &old_lines[patch.old_start()..patch.old_end()] {
            println!("-{line}");
        }
        for line in patch.new_lines() {
            println!("+{line}");
        }
        if hunk_count > 1 {
            println!("({hunk_count} separate hunks coalesced into one range)");
        }
    })
}
