//! PyPI packages installed into an isolated virtualenv with `uv`.

use super::{FetchContext, ResolvedSource, materialize, resolved_entry, write_descriptor};
use crate::core::ApkgError;
use crate::manifest::McpSource;
use crate::store::Store;
use crate::utils::validate_segments;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Version pin marker in a PyPI spec.
const PIN: &str = "==";

/// Virtualenv directory inside the store entry.
pub const VENV_DIR: &str = ".venv";

/// A PyPI package spec: `mcp-server-git` or `mcp-server-git==2026.1.14`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvSource {
    spec: String,
    config: McpSource,
}

#[derive(Debug, Deserialize)]
struct PypiProject {
    info: PypiInfo,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    #[serde(default)]
    version: String,
}

impl UvSource {
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
    pub fn package_name(&self) -> &str {
        self.spec.split_once(PIN).map_or(self.spec.as_str(), |(name, _)| name)
    }

    /// The pinned version, if the package spec carries one.
    #[must_use]
    pub fn pinned_version(&self) -> Option<&str> {
        self.spec.split_once(PIN).map(|(_, version)| version)
    }

    /// `uv/<name>/<version>`.
    pub fn store_segments(&self, version: &str) -> Result<Vec<String>> {
        let segments = vec!["uv".to_string(), self.package_name().to_string(), version.to_string()];
        validate_segments(&segments)?;
        Ok(segments)
    }

    pub async fn fetch(&self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let version = self
            .resolve_version(ctx)
            .await
            .with_context(|| format!("resolving PyPI package '{}'", self.spec))?;
        let segments = self.store_segments(&version)?;
        let name = self.package_name();

        materialize(store, &segments, "uv", |dest| {
            let version = version.as_str();
            async move {
                let venv = dest.join(VENV_DIR);
                ctx.tool("uv")
                    .args(["venv", "--relocatable", "--quiet"])
                    .arg(&venv)
                    .execute_success(&ctx.cancel)
                    .await
                    .context("creating virtualenv")?;
                ctx.tool("uv")
                    .args(["pip", "install", "--quiet", "--python"])
                    .arg(venv.join("bin").join("python"))
                    .arg(format!("{name}{PIN}{version}"))
                    .execute_success(&ctx.cancel)
                    .await
                    .context("installing package")?;
                Ok(())
            }
        })
        .await
        .with_context(|| format!("installing PyPI package {name}{PIN}{version}"))?;

        write_descriptor(store, &segments, &self.config).await?;
        resolved_entry(store, &segments).await
    }

    /// The version to install: the pin, or the latest release PyPI reports.
    pub async fn resolve_version(&self, ctx: &FetchContext) -> Result<String> {
        if let Some(version) = self.pinned_version() {
            tracing::debug!(target: "source::uv", "{} is pinned", self.spec);
            return Ok(version.to_string());
        }

        let name = self.package_name();
        let url = format!("{}/pypi/{}/json", ctx.pypi_index_url, name);
        let registry_error = |reason: String| ApkgError::Registry {
            package: name.to_string(),
            reason,
        };

        tracing::debug!(target: "source::uv", "GET {}", url);
        let outcome = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(ApkgError::Cancelled.into()),
            result = query_pypi(&ctx.http, &url) => {
                result.with_context(|| format!("querying {url}"))?
            }
        };
        let project =
            outcome.map_err(|status| registry_error(format!("PyPI returned status {status}")))?;

        if project.info.version.is_empty() {
            return Err(registry_error("no version reported".to_string()).into());
        }
        tracing::debug!(target: "source::uv", "{} resolved to {}", name, project.info.version);
        Ok(project.info.version)
    }
}

/// GETs the PyPI JSON document. A non-success status is returned as `Err`
/// in the inner result.
async fn query_pypi(
    http: &reqwest::Client,
    url: &str,
) -> reqwest::Result<std::result::Result<PypiProject, reqwest::StatusCode>> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Ok(Err(status));
    }
    response.json::<PypiProject>().await.map(Ok)
}
