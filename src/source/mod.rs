//! Source variants and the fetch pipeline
//!
//! A [`Source`] is one concrete origin for package content. Every variant
//! follows the same pipeline:
//!
//! 1. **Resolve** the mutable reference (branch, `latest`, version range) to
//!    an immutable identity (commit, concrete version, image digest).
//! 2. **Key** the identity as store segments.
//! 3. **Materialize** on a cache miss, into a staged sibling that is renamed
//!    into place (see [`Store::stage`]). A failed install leaves nothing.
//! 4. **Describe**: MCP sources rewrite `mcp.toml` on every fetch, hit or miss.
//! 5. **Hash** the entry and return a [`ResolvedSource`].
//!
//! | Variant | Identity | Segments |
//! |---|---|---|
//! | [`GitSource`] | commit | `repos/<host>/<owner>/<repo>/<commit>` |
//! | [`NpmSource`] | version | `npm/<@scope>/<name>/<version>` |
//! | [`UvSource`] | version | `uv/<name>/<version>` |
//! | [`GoSource`] | version | `go/<module...>/<version>` |
//! | [`OciSource`] | image digest | `oci/<name>/<digest>` |
//! | [`StaticSource`] | descriptor hash | `static/<name>/<sha256>` |
//! | [`LocalSource`] | none | absolute path, uncached |
//!
//! # Cancellation
//!
//! Every subprocess is raced against [`FetchContext::cancel`]. Cancelling the
//! token kills the child and the fetch fails with
//! [`ApkgError::Cancelled`](crate::core::ApkgError::Cancelled).

mod git;
mod go;
mod local;
mod npm;
mod oci;
pub mod reference;
mod static_config;
mod uv;

pub use git::GitSource;
pub use go::GoSource;
pub use local::LocalSource;
pub use npm::NpmSource;
pub use oci::OciSource;
pub use reference::parse_reference;
pub use static_config::StaticSource;
pub use uv::UvSource;

use crate::config::{Config, DEFAULT_PYPI_INDEX_URL};
use crate::core::ApkgError;
use crate::manifest::{MCP_FILE_MODE, MCP_FILE_NAME, McpKind, McpSource, SkillSource};
use crate::store::Store;
use anyhow::{Context, Result};
use serde::Serialize;
use crate::utils::ToolCommand;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// The outcome of a fetch, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    /// Directory holding the usable content.
    pub dir: PathBuf,
    /// Resolved commit (git only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Original ref as requested (git only).
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// `sha256:<hex>` over `dir`; `None` only for local sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

/// Per-invocation state shared by every fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Cancels in-flight subprocesses.
    pub cancel: CancellationToken,
    /// Client for registry metadata requests.
    pub http: reqwest::Client,
    /// Base URL of the PyPI JSON API.
    pub pypi_index_url: String,
    /// Container engine override.
    pub container_engine: Option<String>,
    /// Binaries to run in place of the package-manager tools (`npm`, `uv`,
    /// `go`), keyed by tool name. Unlisted tools are looked up on `PATH`.
    pub tools: BTreeMap<String, PathBuf>,
}

impl FetchContext {
    /// Context with default registry settings and a fresh token.
    pub fn new() -> Result<Self> {
        Ok(Self {
            cancel: CancellationToken::new(),
            http: build_http_client()?,
            pypi_index_url: DEFAULT_PYPI_INDEX_URL.to_string(),
            container_engine: None,
            tools: BTreeMap::new(),
        })
    }

    /// Context reflecting `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            pypi_index_url: config.pypi_index_url.clone(),
            container_engine: config.container_engine.clone(),
            ..Self::new()?
        })
    }

    /// Replaces the cancellation token, e.g. with one tied to Ctrl-C.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `program` whenever the tool `name` is invoked.
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), program.into());
        self
    }

    /// Command builder for the tool `name`, honoring [`FetchContext::tools`].
    #[must_use]
    pub fn tool(&self, name: &str) -> ToolCommand {
        match self.tools.get(name) {
            Some(program) => ToolCommand::new(program),
            None => ToolCommand::new(name),
        }
    }
}

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("apkg/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")
}

/// One concrete origin for package content.
#[derive(Debug, Clone)]
pub enum Source {
    Git(GitSource),
    Npm(NpmSource),
    Uv(UvSource),
    Go(GoSource),
    Oci(OciSource),
    Static(StaticSource),
    Local(LocalSource),
}

impl Source {
    /// Builds the source for a skill record: git when `git` is set, otherwise
    /// the local directory named by `path`.
    #[must_use]
    pub fn from_skill_config(config: &SkillSource) -> Self {
        match &config.git {
            Some(url) if !url.is_empty() => Self::Git(GitSource::new(
                url.clone(),
                config.path.clone(),
                config.reference.clone().unwrap_or_default(),
            )),
            _ => Self::Local(LocalSource::new(&config.path)),
        }
    }

    /// Builds the source for an MCP server record keyed `name` in the
    /// manifest. An empty `config.name` is filled from the key.
    ///
    /// # Errors
    ///
    /// [`ApkgError::UnsupportedConfig`] for package specs without a known
    /// ecosystem prefix (`npm:`, `uv:`, `go:`).
    pub fn from_mcp_config(name: &str, mut config: McpSource) -> Result<Self> {
        if config.name.is_empty() {
            config.name = name.to_string();
        }

        let source = match &config.kind {
            McpKind::Package { package } => {
                if let Some(spec) = package.strip_prefix("npm:") {
                    Self::Npm(NpmSource::new(spec, config.clone()))
                } else if let Some(spec) = package.strip_prefix("uv:") {
                    Self::Uv(UvSource::new(spec, config.clone()))
                } else if let Some(spec) = package.strip_prefix("go:") {
                    Self::Go(GoSource::new(spec, config.clone()))
                } else {
                    return Err(ApkgError::UnsupportedConfig {
                        name: config.name.clone(),
                        reason: format!(
                            "package '{package}' has no known ecosystem prefix (npm:, uv:, go:)"
                        ),
                    }
                    .into());
                }
            }
            McpKind::Container(_) => Self::Oci(OciSource::new(config)),
            McpKind::Command { .. } | McpKind::External { .. } => {
                Self::Static(StaticSource::new(config))
            }
        };
        Ok(source)
    }

    /// Resolves and materializes this source.
    ///
    /// Takes `&mut self` because container sources stamp the resolved digest
    /// into their config.
    pub async fn fetch(&mut self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        match self {
            Self::Git(source) => source.fetch(ctx, store).await,
            Self::Npm(source) => source.fetch(ctx, store).await,
            Self::Uv(source) => source.fetch(ctx, store).await,
            Self::Go(source) => source.fetch(ctx, store).await,
            Self::Oci(source) => source.fetch(ctx, store).await,
            Self::Static(source) => source.fetch(ctx, store).await,
            Self::Local(source) => source.fetch().await,
        }
    }

    /// The MCP record behind this source, including anything stamped by the
    /// last fetch. `None` for skill sources.
    #[must_use]
    pub fn mcp_config(&self) -> Option<&McpSource> {
        match self {
            Self::Npm(source) => Some(source.config()),
            Self::Uv(source) => Some(source.config()),
            Self::Go(source) => Some(source.config()),
            Self::Oci(source) => Some(source.config()),
            Self::Static(source) => Some(source.config()),
            Self::Git(_) | Self::Local(_) => None,
        }
    }

    /// Short label for logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Git(_) => "git",
            Self::Npm(_) => "npm",
            Self::Uv(_) => "uv",
            Self::Go(_) => "go",
            Self::Oci(_) => "oci",
            Self::Static(_) => "static",
            Self::Local(_) => "local",
        }
    }
}

/// Ensures the entry at `segments` exists, running `install` into a staged
/// directory on a miss. Returns whether an install ran.
///
/// A failed install drops the staged directory, so nothing is left behind.
pub(crate) async fn materialize<S, F, Fut>(
    store: &Store,
    segments: &[S],
    target: &'static str,
    install: F,
) -> Result<bool>
where
    S: AsRef<Path>,
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if store.exists(segments).await? {
        tracing::debug!(target: "store", "cache hit: {}", store.path(segments).display());
        return Ok(false);
    }
    tracing::debug!(target: "store", "cache miss: {}", store.path(segments).display());

    let staged = store.stage(segments).await?;
    if let Err(e) = install(staged.path().to_path_buf()).await {
        tracing::warn!(
            target: "store",
            "{} install of {} failed, discarding {}: {:#}",
            target,
            staged.target().display(),
            staged.path().display(),
            e
        );
        drop(staged);
        return Err(e);
    }
    staged.commit().await?;
    Ok(true)
}

/// Rewrites `mcp.toml` inside the entry at `segments`.
pub(crate) async fn write_descriptor<S: AsRef<str>>(
    store: &Store,
    segments: &[S],
    config: &McpSource,
) -> Result<()> {
    let data = config.to_descriptor()?;
    let mut file: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
    file.push(MCP_FILE_NAME);
    store
        .write_file(&data, MCP_FILE_MODE, &file)
        .await
        .with_context(|| format!("writing {MCP_FILE_NAME} for '{}'", config.name))
}

/// Writes `descriptor` as `mcp.toml` into a staged directory.
pub(crate) async fn write_staged_descriptor(dest: &Path, descriptor: &[u8]) -> Result<()> {
    let path = dest.join(MCP_FILE_NAME);
    tokio::fs::write(&path, descriptor)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    set_descriptor_mode(&path).await
}

#[cfg(unix)]
async fn set_descriptor_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(MCP_FILE_MODE))
        .await
        .context("setting descriptor permissions")
}

#[cfg(not(unix))]
async fn set_descriptor_mode(_path: &Path) -> Result<()> {
    Ok(())
}

/// Hashes the entry and assembles a non-git [`ResolvedSource`].
pub(crate) async fn resolved_entry<S: AsRef<Path>>(
    store: &Store,
    segments: &[S],
) -> Result<ResolvedSource> {
    let integrity = store.hash_dir(segments).await?;
    Ok(ResolvedSource {
        dir: store.path(segments),
        commit: None,
        reference: None,
        integrity: Some(integrity),
    })
}

/// Splits `spec` at its last `@` when that `@` is not the first character,
/// which keeps npm scopes (`@scope/pkg`) intact.
pub(crate) fn split_version_suffix(spec: &str) -> (&str, Option<&str>) {
    match spec.rfind('@') {
        Some(idx) if idx > 0 => (&spec[..idx], Some(&spec[idx + 1..])),
        _ => (spec, None),
    }
}
