//! npm-ecosystem packages, installed into a private prefix.

use super::{
    FetchContext, ResolvedSource, materialize, resolved_entry, split_version_suffix,
    write_descriptor,
};
use crate::core::ApkgError;
use crate::manifest::McpSource;
use crate::store::Store;
use crate::utils::validate_segments;
use anyhow::{Context, Result};

/// An npm package spec such as `@modelcontextprotocol/server-everything@^1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmSource {
    spec: String,
    config: McpSource,
}

impl NpmSource {
    pub fn new(spec: impl Into<String>, config: McpSource) -> Self {
        Self {
            spec: spec.into(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &McpSource {
        &self.config
    }

    /// Package name with any version suffix removed; scopes are kept.
    #[must_use]
    pub fn package_name(&self) -> &str {
        split_version_suffix(&self.spec).0
    }

    /// `npm/<name parts>/<version>`.
    pub fn store_segments(&self, version: &str) -> Result<Vec<String>> {
        let mut segments = vec!["npm".to_string()];
        segments.extend(self.package_name().split('/').map(str::to_string));
        segments.push(version.to_string());
        validate_segments(&segments)?;
        Ok(segments)
    }

    pub async fn fetch(&self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let version = self
            .resolve_version(ctx)
            .await
            .with_context(|| format!("resolving npm package '{}'", self.spec))?;
        let segments = self.store_segments(&version)?;
        let name = self.package_name();

        materialize(store, &segments, "npm", |dest| {
            let version = version.as_str();
            async move {
                ctx.tool("npm")
                    .arg("install")
                    .arg("--prefix")
                    .arg(&dest)
                    .arg(format!("{name}@{version}"))
                    .execute_success(&ctx.cancel)
                    .await?;
                Ok(())
            }
        })
        .await
        .with_context(|| format!("installing npm package {name}@{version}"))?;

        write_descriptor(store, &segments, &self.config).await?;
        resolved_entry(store, &segments).await
    }

    async fn resolve_version(&self, ctx: &FetchContext) -> Result<String> {
        let output = ctx.tool("npm")
            .args(["view", self.spec.as_str(), "version", "--json"])
            .stdout_string(&ctx.cancel)
            .await?;
        let version = parse_view_output(&self.spec, &output)?;
        tracing::debug!(target: "source::npm", "{} resolved to {}", self.spec, version);
        Ok(version)
    }
}

/// Interprets `npm view <spec> version --json`.
///
/// A single match prints a string. A range matching several versions prints
/// a list, and the first element is taken as printed, which is not
/// necessarily the highest version.
pub(crate) fn parse_view_output(spec: &str, output: &str) -> Result<String> {
    let registry_error = |reason: String| ApkgError::Registry {
        package: spec.to_string(),
        reason,
    };

    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| registry_error(format!("unparseable `npm view` output: {e}")))?;

    let version = match value {
        serde_json::Value::String(version) => version,
        serde_json::Value::Array(versions) => match versions.into_iter().next() {
            Some(serde_json::Value::String(first)) => first,
            Some(other) => {
                return Err(registry_error(format!("unexpected version entry {other}")).into());
            }
            None => return Err(registry_error("no versions found".to_string()).into()),
        },
        other => return Err(registry_error(format!("unexpected output {other}")).into()),
    };

    if version.is_empty() {
        return Err(registry_error("empty version".to_string()).into());
    }
    Ok(version)
}
