mod filter;
mod inspect;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;

pub use filter::Filter;
pub use inspect::Inspect;

#[derive(Debug, Parser)]
#[command(name = "gmlzip", version, about = "Filter zip-packaged CityGML datasets by feature id")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file; defaults to ./gmlzip.toml when present.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Filter(Filter),
    Inspect(Inspect),
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let options = crate::config::load(self.config.as_deref())?;
        debug!(?options, "loaded configuration");
        match self.command {
            Command::Filter(cmd) => cmd.run(options),
            Command::Inspect(cmd) => cmd.run(options),
        }
    }
}
