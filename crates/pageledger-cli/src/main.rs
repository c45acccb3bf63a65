use anyhow::Result;
use clap::{Parser, Subcommand};

mod commit;
mod context;
mod members;
mod promote;
mod query;
mod serve;

use context::GlobalArgs;

/// Per-page commit ledger with a local → develop → release pipeline
///
/// Every page of a project keeps a chain of line-range patches. New commits
/// land in LOCAL; members push them to DEVELOP and merge one as the DEVELOP
/// head; admins promote the DEVELOP head to RELEASE.
///
/// QUICK START:
///
///   pageledger init
///   pageledger --user 1 project create 1
///   pageledger --user 1 commit --project 1 --page 1 --file page1.md
///   pageledger --user 1 push --project 1 <hash>
///   pageledger --user 1 merge --project 1 <hash>
///   pageledger --user 1 promote --project 1 <hash>
///   pageledger --user 1 content --project 1 --page 1 --tier release
#[derive(Parser)]
#[command(name = "pageledger")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'pageledger <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store directory and a default pageledger.toml
    ///
    /// Safe to run more than once; an existing config file is left alone.
    Init,

    /// Serve line-delimited JSON requests over TCP
    Serve(serve::ServeArgs),

    /// Manage projects
    #[command(subcommand)]
    Project(members::ProjectCommands),

    /// Manage project members
    #[command(subcommand)]
    Members(members::MembersCommands),

    /// Record a new commit on a page
    Commit(commit::CommitArgs),

    /// Print the patch between two files
    Diff(commit::DiffArgs),

    /// Move a LOCAL commit to DEVELOP
    Push(promote::TransitionArgs),

    /// Make a DEVELOP commit the page's DEVELOP head
    Merge(promote::TransitionArgs),

    /// Publish the DEVELOP head as the RELEASE head
    Promote(promote::TransitionArgs),

    /// Print a page's text at a tier
    Content(query::ContentArgs),

    /// Show a commit with the text before and after it
    Show(query::ShowArgs),

    /// List a page's commits at a tier, latest first
    Log(query::LogArgs),

    /// List commits at a tier across a page range
    Search(query::SearchArgs),

    /// Show a page's head pointers
    Heads(query::HeadsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pageledger::telemetry::init(cli.global.verbose);
    let ctx = context::Context::new(cli.global)?;

    match cli.command {
        Commands::Init => context::init(&ctx),
        Commands::Serve(ref args) => serve::run(&ctx, args),
        Commands::Project(ref cmd) => members::run_project(&ctx, cmd),
        Commands::Members(ref cmd) => members::run(&ctx, cmd),
        Commands::Commit(ref args) => commit::run(&ctx, args),
        Commands::Diff(ref args) => commit::run_diff(&ctx, args),
        Commands::Push(ref args) => promote::run(&ctx, promote::Step::Push, args),
        Commands::Merge(ref args) => promote::run(&ctx, promote::Step::Merge, args),
        Commands::Promote(ref args) => promote::run(&ctx, promote::Step::Promote, args),
        Commands::Content(ref args) => query::content(&ctx, args),
        Commands::Show(ref args) => query::show(&ctx, args),
        Commands::Log(ref args) => query::log(&ctx, args),
        Commands::Search(ref args) => query::search(&ctx, args),
        Commands::Heads(ref args) => query::heads(&ctx, args),
    }
}
