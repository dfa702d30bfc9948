//! MCP servers that need no installation: host commands and external URLs.

use super::{FetchContext, ResolvedSource, resolved_entry, write_staged_descriptor};
use crate::manifest::McpSource;
use crate::store::Store;
use crate::utils::validate_segments;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// A server whose descriptor is its only content.
///
/// Keyed by the hash of the serialized descriptor, so two differently
/// configured servers sharing a name never collide and identical ones share
/// an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSource {
    config: McpSource,
}

impl StaticSource {
    #[must_use]
    pub fn new(config: McpSource) -> Self {
        Self {
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &McpSource {
        &self.config
    }

    /// `static/<name>/<sha256 of descriptor>`.
    pub fn store_segments(&self, descriptor: &[u8]) -> Result<Vec<String>> {
        let segments = vec![
            "static".to_string(),
            self.config.name.clone(),
            hex::encode(Sha256::digest(descriptor)),
        ];
        validate_segments(&segments)?;
        Ok(segments)
    }

    pub async fn fetch(&self, _ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let descriptor = self.config.to_descriptor()?;
        let segments = self.store_segments(&descriptor)?;

        super::materialize(store, &segments, "static", |dest| async move {
            write_staged_descriptor(&dest, &descriptor).await
        })
        .await
        .with_context(|| format!("recording static server '{}'", self.config.name))?;

        tracing::debug!(target: "source::static", "'{}' at {}", self.config.name, segments[2]);
        resolved_entry(store, &segments).await
    }
}
