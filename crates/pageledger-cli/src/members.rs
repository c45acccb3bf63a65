use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use tracing::instrument;

use pageledger::{ProjectId, Role, UserId};

use crate::context::Context;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Register a project with you as its first admin
    Create {
        /// Project id
        project: ProjectId,
    },
}

#[derive(Args)]
pub struct ProjectArg {
    /// Project id
    #[arg(long)]
    project: ProjectId,
}

#[derive(Subcommand)]
pub enum MembersCommands {
    /// List members and their roles
    List(ProjectArg),

    /// Add a member (admin only)
    Invite {
        #[command(flatten)]
        project: ProjectArg,
        /// User to add
        target: UserId,
        /// Their role
        #[arg(long, default_value = "member")]
        role: Role,
    },

    /// Change a member's role (admin only)
    SetRole {
        #[command(flatten)]
        project: ProjectArg,
        /// Member to change
        target: UserId,
        /// New role
        role: Role,
    },

    /// Remove a member (admin only)
    Remove {
        #[command(flatten)]
        project: ProjectArg,
        /// Member to remove
        target: UserId,
    },
}

pub fn run_project(ctx: &Context, cmd: &ProjectCommands) -> Result<()> {
    let user = ctx.user()?;
    match cmd {
        ProjectCommands::Create { project } => {
            ctx.ledger()?.create_project(*project, user)?;
            ctx.emit(&json!({ "status": "created", "project": project }), || {
                println!("Created project {project} (admin: user {user})");
            })
        }
    }
}

#[instrument(skip_all)]
pub fn run(ctx: &Context, cmd: &MembersCommands) -> Result<()> {
    let user = ctx.user()?;
    let ledger = ctx.ledger()?;
    match cmd {
        MembersCommands::List(ProjectArg { project }) => {
            let members = ledger.members(*project, user)?;
            ctx.emit(&members, || {
                for m in &members {
                    println!("{:>8}  {}", m.user_id, m.role);
                }
            })
        }
        MembersCommands::Invite { project, target, role } => {
            ledger.invite(project.project, user, *target, *role)?;
            ctx.emit(&json!({ "status": "ok" }), || {
                println!("Invited user {target} to project {} as {role}", project.project);
            })
        }
        MembersCommands::SetRole { project, target, role } => {
            ledger.set_role(project.project, user, *target, *role)?;
            ctx.emit(&json!({ "status": "ok" }), || {
                println!("User {target} is now {role} on project {}", project.project);
            })
        }
        MembersCommands::Remove { project, target } => {
            ledger.remove_member(project.project, user, *target)?;
            ctx.emit(&json!({ "status": "ok" }), || {
                println!("Removed user {target} from project {}", project.project);
            })
        }
    }
}
