//! `apkg fetch`: resolve a compact reference into the store.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::source::{FetchContext, ResolvedSource, parse_reference};
use crate::store::Store;

/// Fetches `owner/repo[/path]@ref` or a local directory.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Reference to fetch, e.g. anthropics/skills/skills/pdf@main or ./skill
    pub reference: String,

    /// Print the result as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

impl FetchCommand {
    /// Fetches the reference and returns the rendered result.
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> Result<String> {
        let (mut source, _) = parse_reference(&self.reference)?;
        let store = Store::from_config(config);
        let ctx = FetchContext::from_config(config)?.with_cancel(cancel);

        eprintln!("{} {} ({})", "Fetching".cyan().bold(), self.reference, source.kind());
        let resolved = source
            .fetch(&ctx, &store)
            .await
            .with_context(|| format!("fetching {}", self.reference))?;

        self.render(&resolved)
    }

    /// Renders `resolved` in the requested format.
    pub fn render(&self, resolved: &ResolvedSource) -> Result<String> {
        if self.json {
            serde_json::to_string_pretty(resolved).context("serializing result as JSON")
        } else {
            let text = toml::to_string(resolved).context("serializing result as TOML")?;
            Ok(text.trim_end().to_string())
        }
    }
}
