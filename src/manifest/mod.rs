//! Persisted source records for skills and MCP servers
//!
//! These are the canonical configuration records a manifest stores for each
//! entry. Loading and saving the manifest file itself belongs to the caller;
//! this module only defines the records, their TOML shape, and the `mcp.toml`
//! descriptor written next to fetched content.
//!
//! # Skill Sources
//!
//! ```toml
//! [skills.pdf]
//! git = "https://github.com/anthropics/skills.git"
//! path = "skills/pdf"
//! ref = "main"
//!
//! [skills.local-helper]
//! path = "./skills/helper"
//! ```
//!
//! # MCP Server Sources
//!
//! Exactly one `kind` is populated per server:
//!
//! ```toml
//! [mcp-servers.everything]
//! transport = "stdio"
//! kind = "package"
//! package = "npm:@modelcontextprotocol/server-everything"
//!
//! [mcp-servers.git]
//! transport = "stdio"
//! kind = "package"
//! package = "uv:mcp-server-git==2026.1.14"
//! args = ["--repository", "."]
//!
//! [mcp-servers.echo]
//! transport = "stdio"
//! kind = "command"
//! command = "/usr/bin/echo"
//!
//! [mcp-servers.remote]
//! transport = "http"
//! kind = "external"
//! url = "https://mcp.example.com/mcp"
//! headers = { Authorization = "Bearer ..." }
//!
//! [mcp-servers.fetch]
//! transport = "http"
//! kind = "container"
//! image = "ghcr.io/example/mcp-fetch:latest"
//! port = 8080
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// File name of the descriptor written next to MCP server content.
pub const MCP_FILE_NAME: &str = "mcp.toml";

/// Permission bits of the descriptor file.
pub const MCP_FILE_MODE: u32 = 0o644;

/// Routing path stamped into container configs that leave it unset.
pub const DEFAULT_CONTAINER_PATH: &str = "/mcp";

/// Where a skill comes from.
///
/// A record with `git` set is a repository source; otherwise `path` names a
/// local directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSource {
    /// Repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    /// Sub-path inside the repository, or the local directory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Branch, tag, or commit (full or abbreviated).
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl SkillSource {
    /// A repository-backed skill.
    pub fn git(
        url: impl Into<String>,
        path: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            git: Some(url.into()),
            path: path.into(),
            reference: Some(reference.into()),
        }
    }

    /// A skill in a local directory.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            git: None,
            path: path.into(),
            reference: None,
        }
    }

    /// Key used to match this record against lock entries:
    /// `<git>|<path>` for repositories, the bare path for local skills.
    #[must_use]
    pub fn lock_key(&self) -> String {
        lock_key(self.git.as_deref(), &self.path)
    }
}

/// Shared lock key construction for sources and lock entries.
pub(crate) fn lock_key(git: Option<&str>, path: &str) -> String {
    match git {
        Some(git) if !git.is_empty() => format!("{git}|{path}"),
        _ => path.to_string(),
    }
}

/// How an agent talks to an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// Container settings for servers run from an OCI image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,

    /// Port inside the container the server listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Resolved image digest (hex, no `sha256:` prefix). Stamped on fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// HTTP path the server is reachable on inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Bind mounts, `host:container[:opts]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

/// The origin of an MCP server, keyed by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum McpKind {
    /// A package apkg installs and pins: `npm:<pkg>[@range]`,
    /// `uv:<pkg>[==version]`, or `go:<module>[@version]`.
    Package { package: String },
    /// A command already installed on the host.
    Command { command: String },
    /// An HTTP server reachable at a fixed URL.
    External { url: String },
    /// A server run from an OCI image.
    Container(ContainerConfig),
}

/// Configuration record for one MCP server, and the content of `mcp.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpSource {
    pub transport: Transport,

    /// Server name; defaults to the key of the manifest table.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(flatten)]
    pub kind: McpKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment for locally run servers. Values never reach the lockfile.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// HTTP headers for HTTP servers. Values never reach the lockfile.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl McpSource {
    /// A record of the given kind with no args, env, or headers.
    #[must_use]
    pub fn new(transport: Transport, kind: McpKind) -> Self {
        Self {
            transport,
            name: String::new(),
            kind,
            args: Vec::new(),
            env: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Serialized descriptor bytes, as written to `mcp.toml`.
    ///
    /// Field order is fixed and maps are sorted, so equal records always
    /// produce equal bytes.
    pub fn to_descriptor(&self) -> Result<Vec<u8>> {
        let text = toml::to_string(self)
            .with_context(|| format!("serializing MCP config for '{}'", self.name))?;
        Ok(text.into_bytes())
    }

    /// Parses an `mcp.toml` descriptor.
    pub fn from_descriptor(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).context("descriptor is not valid UTF-8")?;
        toml::from_str(text).context("parsing MCP descriptor")
    }
}
