//! Global flags, configuration loading and output helpers shared by every
//! subcommand.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use serde::Serialize;

use pageledger::Ledger;
use pageledger::UserId;
use pageledger::config::{CONFIG_FILE, LedgerConfig};
use pageledger::storage::FileBackend;

#[derive(Args)]
pub struct GlobalArgs {
    /// The acting user id
    #[arg(long, global = true, env = "PAGELEDGER_USER")]
    pub user: Option<UserId>,

    /// Store directory (overrides `storage.path` in the config file)
    #[arg(long, global = true, env = "PAGELEDGER_STORE")]
    pub store: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, env = "PAGELEDGER_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level unless PAGELEDGER_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

pub struct Context {
    pub config: LedgerConfig,
    pub config_path: PathBuf,
    pub user: Option<UserId>,
    pub json: bool,
}

impl Context {
    pub fn new(global: GlobalArgs) -> Result<Self> {
        let mut config = LedgerConfig::load(&global.config)?;
        if let Some(store) = global.store {
            config.storage.path = store;
        }
        Ok(Self {
            config,
            config_path: global.config,
            user: global.user,
            json: global.json,
        })
    }

    /// The acting user; every ledger operation needs one.
    pub fn user(&self) -> Result<UserId> {
        match self.user {
            Some(user) => Ok(user),
            None => bail!("no acting user.\n  To fix: pass --user <id> or set PAGELEDGER_USER."),
        }
    }

    pub fn ledger(&self) -> Result<Ledger> {
        Ledger::from_config(&self.config.storage).with_context(|| {
            format!(
                "opening {} store at {}",
                self.config.storage.backend,
                self.config.storage.path.display()
            )
        })
    }

    /// Print `value` as JSON with `--json`, otherwise run `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# pageledger configuration

[storage]
# "file" or "memory"
backend = "file"
path = ".pageledger"

[server]
listen = "127.0.0.1:7341"
max_request_bytes = 1048576
"#;

pub fn init(ctx: &Context) -> Result<()> {
    let backend = FileBackend::open(&ctx.config.storage.path)
        .with_context(|| format!("creating store at {}", ctx.config.storage.path.display()))?;
    if ctx.config_path.exists() {
        println!("Config already exists: {}", ctx.config_path.display());
    } else {
        std::fs::write(&ctx.config_path, CONFIG_TEMPLATE)
            .with_context(|| format!("writing {}", ctx.config_path.display()))?;
        println!("Wrote {}", ctx.config_path.display());
    }
    println!("Store ready at {}", backend.root().display());
    Ok(())
}
