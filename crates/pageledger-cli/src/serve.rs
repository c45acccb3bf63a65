use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;

use pageledger::api::Service;
use pageledger::server::Server;

use crate::context::Context;

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (overrides `server.listen`)
    #[arg(long)]
    listen: Option<SocketAddr>,
}

pub fn run(ctx: &Context, args: &ServeArgs) -> Result<()> {
    let mut config = ctx.config.server.clone();
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    let ledger = Arc::new(ctx.ledger()?);
    let server = Server::bind(&config, Service::new(ledger))
        .with_context(|| format!("binding {}", config.listen))?;
    println!("Serving on {}", server.local_addr()?);
    server.run();
    Ok(())
}
