//! Go-module packages built with `go install`.

use super::{
    FetchContext, ResolvedSource, materialize, resolved_entry, split_version_suffix,
    write_descriptor,
};
use crate::core::ApkgError;
use crate::manifest::McpSource;
use crate::store::Store;
use crate::utils::validate_segments;
use anyhow::{Context, Result};

/// Version used when the package spec names none.
pub const DEFAULT_VERSION: &str = "latest";

/// A Go package spec: `github.com/org/tool/cmd/server[@version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoSource {
    spec: String,
    config: McpSource,
}

impl GoSource {
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

    #[must_use]
    pub fn module_path(&self) -> &str {
        split_version_suffix(&self.spec).0
    }

    /// The requested version expression, `latest` if absent.
    #[must_use]
    pub fn version_expression(&self) -> &str {
        split_version_suffix(&self.spec).1.unwrap_or(DEFAULT_VERSION)
    }

    /// `go/<module path parts>/<version>`.
    pub fn store_segments(&self, version: &str) -> Result<Vec<String>> {
        let mut segments = vec!["go".to_string()];
        segments.extend(self.module_path().split('/').map(str::to_string));
        segments.push(version.to_string());
        validate_segments(&segments)?;
        Ok(segments)
    }

    pub async fn fetch(&self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let version = self.resolve_version(ctx).await?;
        let segments = self.store_segments(&version)?;
        let module = self.module_path();

        materialize(store, &segments, "go", |dest| {
            let version = version.as_str();
            async move {
                ctx.tool("go")
                    .arg("install")
                    .arg(format!("{module}@{version}"))
                    .env("GOBIN", dest.join("bin"))
                    .env("GOWORK", "off")
                    .execute_success(&ctx.cancel)
                    .await?;
                Ok(())
            }
        })
        .await
        .with_context(|| format!("installing Go module {module}@{version}"))?;

        write_descriptor(store, &segments, &self.config).await?;
        resolved_entry(store, &segments).await
    }

    /// Asks the module proxy for the concrete version. Package paths below a
    /// module root cannot be listed, so any failure other than cancellation
    /// falls back to the expression as written and `go install` decides.
    async fn resolve_version(&self, ctx: &FetchContext) -> Result<String> {
        let expression = self.version_expression();
        let query = format!("{}@{}", self.module_path(), expression);

        let result = ctx.tool("go")
            .args(["list", "-m", "-f", "{{.Version}}", query.as_str()])
            .env("GOWORK", "off")
            .stdout_string(&ctx.cancel)
            .await;

        match result {
            Ok(version) if !version.is_empty() => {
                tracing::debug!(target: "source::go", "{} resolved to {}", query, version);
                Ok(version)
            }
            Err(e) if matches!(e.downcast_ref::<ApkgError>(), Some(ApkgError::Cancelled)) => {
                Err(e)
            }
            Ok(_) | Err(_) => {
                tracing::debug!(
                    target: "source::go",
                    "could not list {}, using '{}' verbatim",
                    query,
                    expression
                );
                Ok(expression.to_string())
            }
        }
    }
}
