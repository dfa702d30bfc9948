//! MCP servers run from OCI container images.

use super::{
    FetchContext, ResolvedSource, materialize, resolved_entry, write_descriptor,
    write_staged_descriptor,
};
use crate::container::Engine;
use crate::core::ApkgError;
use crate::manifest::{DEFAULT_CONTAINER_PATH, McpKind, McpSource};
use crate::store::Store;
use crate::utils::validate_segments;
use anyhow::{Context, Result};

/// A container-backed MCP server.
///
/// The store entry holds only the descriptor; the image itself lives in the
/// engine's own storage. The entry is keyed by image digest so that a moved
/// tag produces a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciSource {
    config: McpSource,
}

impl OciSource {
    #[must_use]
    pub fn new(config: McpSource) -> Self {
        Self {
            config,
        }
    }

    /// The config, including the digest and path stamped by the last fetch.
    #[must_use]
    pub fn config(&self) -> &McpSource {
        &self.config
    }

    /// `oci/<name>/<digest>`.
    pub fn store_segments(&self, digest: &str) -> Result<Vec<String>> {
        let segments = vec!["oci".to_string(), self.config.name.clone(), digest.to_string()];
        validate_segments(&segments)?;
        Ok(segments)
    }

    /// Pulls the image if needed, stamps its digest into the config, and
    /// rewrites the descriptor.
    pub async fn fetch(&mut self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let McpKind::Container(container) = &self.config.kind else {
            return Err(ApkgError::UnsupportedConfig {
                name: self.config.name.clone(),
                reason: "not a container server".to_string(),
            }
            .into());
        };
        let image = container.image.clone();

        let engine = Engine::detect(ctx.container_engine.as_deref())?;
        engine.ensure_image(&image, &ctx.cancel).await?;
        let digest = engine.image_digest(&image, &ctx.cancel).await?;
        tracing::debug!(target: "source::oci", "{} resolved to {}", image, digest);

        self.stamp(&digest);

        let segments = self.store_segments(&digest)?;
        let descriptor = self.config.to_descriptor()?;
        let installed = materialize(store, &segments, "oci", |dest| async move {
            write_staged_descriptor(&dest, &descriptor).await
        })
        .await
        .with_context(|| format!("recording container server '{}'", self.config.name))?;
        if !installed {
            write_descriptor(store, &segments, &self.config)
                .await
                .with_context(|| format!("recording container server '{}'", self.config.name))?;
        }
        resolved_entry(store, &segments).await
    }

    /// Records the resolved digest and defaults the routing path.
    fn stamp(&mut self, digest: &str) {
        if let McpKind::Container(container) = &mut self.config.kind {
            container.digest = Some(digest.to_string());
            if container.path.as_deref().is_none_or(str::is_empty) {
                container.path = Some(DEFAULT_CONTAINER_PATH.to_string());
            }
        }
    }
}
