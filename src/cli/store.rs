//! `apkg store`: inspect and prune store entries by segment.
//!
//! Segments are the path components of an entry below the store root, as
//! listed in the [`source`](crate::source) module docs. Every segment is
//! validated, so `..` and absolute components are rejected before the store
//! is touched.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Config;
use crate::store::Store;
use crate::utils::validate_segments;

#[derive(Debug, Args)]
pub struct StoreCommand {
    #[command(subcommand)]
    pub command: StoreSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum StoreSubcommands {
    /// Print the absolute path of an entry (the store root with no segments)
    Path {
        segments: Vec<String>,
    },
    /// Print the sha256 integrity of an entry
    Hash {
        #[arg(required = true)]
        segments: Vec<String>,
    },
    /// Delete an entry; missing entries are not an error
    Remove {
        #[arg(required = true)]
        segments: Vec<String>,
    },
}

impl StoreCommand {
    pub async fn execute(&self, config: &Config) -> Result<String> {
        self.execute_with_store(&Store::from_config(config)).await
    }

    /// Runs against an explicit store, returning what should be printed.
    pub async fn execute_with_store(&self, store: &Store) -> Result<String> {
        match &self.command {
            StoreSubcommands::Path {
                segments,
            } => {
                validate_segments(segments)?;
                Ok(store.path(segments).display().to_string())
            }
            StoreSubcommands::Hash {
                segments,
            } => {
                validate_segments(segments)?;
                store.hash_dir(segments).await
            }
            StoreSubcommands::Remove {
                segments,
            } => {
                validate_segments(segments)?;
                let existed = store.exists(segments).await?;
                store.remove(segments).await;
                if existed {
                    eprintln!("{} {}", "Removed".green().bold(), store.path(segments).display());
                } else {
                    eprintln!("{} {}", "Not present:".yellow(), store.path(segments).display());
                }
                Ok(String::new())
            }
        }
    }
}
