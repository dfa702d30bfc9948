//! Lockfile records for reproducible resolution
//!
//! The lockfile (`apkg.lock`) pins every skill to the commit it resolved to
//! and records how each MCP server was installed. The resolver reads the
//! previous lockfile to skip network resolution for unchanged refs and returns
//! a fresh one for the caller to persist.
//!
//! # Format
//!
//! ```toml
//! version = 1
//!
//! [[skills]]
//! git = "https://github.com/anthropics/skills.git"
//! path = "skills/pdf"
//! ref = "main"
//! commit = "4f3c2a1b..."
//! integrity = "sha256:9e1d..."
//!
//! [[mcp-servers]]
//! name = "everything"
//! transport = "stdio"
//! package = "npm:@modelcontextprotocol/server-everything"
//! env_keys = ["API_KEY"]
//! integrity = "sha256:51aa..."
//! install_path = "/home/user/.apkg/npm/@modelcontextprotocol/server-everything/1.2.3"
//! ```
//!
//! Environment and header *values* are never recorded, only their keys.
//!
//! # Version Compatibility
//!
//! A lockfile with a `version` newer than [`LockFile::CURRENT_VERSION`] is
//! rejected with an instruction to upgrade apkg.

use crate::manifest::{McpKind, McpSource, SkillSource, Transport, lock_key};
use crate::source::ResolvedSource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default lockfile name.
pub const LOCKFILE_NAME: &str = "apkg.lock";

/// The resolved state of every skill and MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<SkillLockEntry>,

    #[serde(default, rename = "mcp-servers", skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpLockEntry>,
}

/// Pin for one skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLockEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// The ref as written in the manifest, not the resolved commit.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl SkillLockEntry {
    /// Entry for `source` resolved to `resolved`.
    ///
    /// The ref comes from `source`, so an entry produced by a short-circuited
    /// fetch still records the manifest ref rather than the commit that was
    /// substituted for it.
    #[must_use]
    pub fn from_resolved(source: &SkillSource, resolved: &ResolvedSource) -> Self {
        Self {
            git: source.git.clone(),
            path: source.path.clone(),
            reference: source.reference.clone(),
            commit: resolved.commit.clone(),
            integrity: resolved.integrity.clone(),
        }
    }

    /// Matches [`SkillSource::lock_key`].
    #[must_use]
    pub fn lock_key(&self) -> String {
        lock_key(self.git.as_deref(), &self.path)
    }
}

/// Record of one installed MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpLockEntry {
    pub name: String,
    pub transport: Transport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Sorted names of configured environment variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_keys: Vec<String>,

    /// Sorted names of configured HTTP headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,

    pub install_path: PathBuf,
}

impl McpLockEntry {
    /// Entry for the server keyed `name` whose config resolved to `resolved`.
    #[must_use]
    pub fn from_resolved(name: &str, config: &McpSource, resolved: &ResolvedSource) -> Self {
        let mut entry = Self {
            name: name.to_string(),
            transport: config.transport,
            package: None,
            command: None,
            args: config.args.clone(),
            image: None,
            port: None,
            url: None,
            // BTreeMap keys iterate sorted.
            env_keys: config.env.keys().cloned().collect(),
            header_keys: config.headers.keys().cloned().collect(),
            integrity: resolved.integrity.clone(),
            install_path: resolved.dir.clone(),
        };

        match &config.kind {
            McpKind::Package { package } => entry.package = Some(package.clone()),
            McpKind::Command { command } => entry.command = Some(command.clone()),
            McpKind::External { url } => entry.url = Some(url.clone()),
            McpKind::Container(container) => {
                entry.image = Some(container.image.clone());
                entry.port = container.port;
            }
        }
        entry
    }
}

impl LockFile {
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            skills: Vec::new(),
            mcp_servers: Vec::new(),
        }
    }

    /// Loads a lockfile. A missing or empty file yields [`LockFile::new`].
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, invalid TOML, or a format version newer
    /// than this build understands.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let lockfile: Self = toml::from_str(&content)
            .with_context(|| format!("parsing lockfile {}", path.display()))?;

        if lockfile.version > Self::CURRENT_VERSION {
            anyhow::bail!(
                "Lockfile version {} is newer than supported version {}. \
                 Please upgrade apkg to read {}.",
                lockfile.version,
                Self::CURRENT_VERSION,
                path.display()
            );
        }
        Ok(lockfile)
    }

    /// Writes the lockfile through a temporary sibling and an atomic rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serializing lockfile")?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary file in {}", dir.display()))?;
        temp.write_all(content.as_bytes()).context("writing lockfile")?;
        temp.as_file().sync_all().context("syncing lockfile")?;
        temp.persist(path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Skill entries keyed by [`SkillLockEntry::lock_key`].
    #[must_use]
    pub fn skill_index(&self) -> HashMap<String, &SkillLockEntry> {
        self.skills.iter().map(|entry| (entry.lock_key(), entry)).collect()
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}
