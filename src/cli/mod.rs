//! Command-line interface for apkg.
//!
//! The binary is a thin driver over the library for fetching references and
//! inspecting the store by hand:
//!
//! ```bash
//! apkg fetch anthropics/skills/skills/pdf@main
//! apkg fetch ./skills/helper --json
//! apkg store path repos github.com anthropics skills
//! apkg store hash static echo <sha256>
//! apkg --store-dir /tmp/store store remove npm left-pad 1.3.0
//! ```
//!
//! Ctrl-C cancels the running fetch; the in-flight subprocess is killed and
//! nothing partial is left in the store.

mod fetch;
mod store;


pub use fetch::FetchCommand;
pub use store::{StoreCommand, StoreSubcommands};

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "apkg", version, about = "Fetch skills and MCP servers into a content-addressable store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store root, overriding APKG_STORE_DIR and ~/.apkg/config.toml
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch a reference into the store and print where it landed
    Fetch(FetchCommand),
    /// Inspect or prune store entries
    Store(StoreCommand),
}

impl Cli {
    /// Effective configuration: the layered global config with `--store-dir`
    /// applied on top.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(dir) = &self.store_dir {
            config.store_dir.clone_from(dir);
        }
        Ok(config)
    }

    /// Runs the selected command, printing its output to stdout.
    pub async fn execute(self, cancel: CancellationToken) -> Result<()> {
        let config = self.config()?;
        let output = match self.command {
            Commands::Fetch(cmd) => cmd.execute(&config, cancel).await?,
            Commands::Store(cmd) => cmd.execute(&config).await?,
        };
        if !output.is_empty() {
            println!("{output}");
        }
        Ok(())
    }
}
