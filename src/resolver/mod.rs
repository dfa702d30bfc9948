//! Resolution of manifest records into store entries and lock entries.
//!
//! The resolver turns skill and MCP server records into [`Source`]s, fetches
//! them sequentially, and assembles a fresh [`LockFile`]. When a previous
//! lockfile is supplied, skills whose ref is unchanged are fetched by their
//! locked commit, which is satisfied from the store without contacting the
//! remote.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::lockfile::{LockFile, McpLockEntry, SkillLockEntry};
use crate::manifest::{McpSource, SkillSource};
use crate::source::{FetchContext, GitSource, ResolvedSource, Source};
use crate::store::Store;

/// Lock entries keyed by [`SkillSource::lock_key`].
pub type LockIndex<'a> = HashMap<String, &'a SkillLockEntry>;

/// Builds the source for `config`, substituting the locked commit when the
/// lock entry was produced from the same ref.
///
/// The substitution applies only when an entry exists for the record's lock
/// key, its ref equals the current ref exactly, and it carries a non-empty
/// commit. Anything else falls through to full resolution.
#[must_use]
pub fn reconcile_skill(config: &SkillSource, index: Option<&LockIndex<'_>>) -> Source {
    let source = Source::from_skill_config(config);
    let Source::Git(git) = &source else {
        return source;
    };

    let key = config.lock_key();
    let Some(entry) = index.and_then(|index| index.get(&key)) else {
        return source;
    };

    if entry.reference != config.reference {
        tracing::debug!(
            target: "resolver",
            "ref for {} changed ({:?} -> {:?}), resolving again",
            key,
            entry.reference,
            config.reference
        );
        return source;
    }

    match entry.commit.as_deref() {
        Some(commit) if !commit.is_empty() => {
            tracing::debug!(target: "resolver", "using locked commit {} for {}", commit, key);
            Source::Git(GitSource::new(git.url(), git.path(), commit))
        }
        _ => source,
    }
}

/// Everything a resolution pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved skills by manifest name.
    pub skills: BTreeMap<String, ResolvedSource>,
    /// Resolved MCP servers by manifest name.
    pub mcp_servers: BTreeMap<String, ResolvedSource>,
    /// Lockfile describing this pass, for the caller to save.
    pub lockfile: LockFile,
}

/// Fetches manifest records into a store.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: Store,
    ctx: FetchContext,
}

impl Resolver {
    #[must_use]
    pub fn new(store: Store, ctx: FetchContext) -> Self {
        Self {
            store,
            ctx,
        }
    }

    /// Fetches one skill, consulting `index` for a locked commit.
    ///
    /// The returned lock entry records the ref from `config`, never the
    /// commit substituted for it.
    pub async fn resolve_skill(
        &self,
        config: &SkillSource,
        index: Option<&LockIndex<'_>>,
    ) -> Result<(ResolvedSource, SkillLockEntry)> {
        let mut source = reconcile_skill(config, index);
        let resolved = source.fetch(&self.ctx, &self.store).await?;
        let entry = SkillLockEntry::from_resolved(config, &resolved);
        Ok((resolved, entry))
    }

    /// Fetches one MCP server keyed `name`.
    ///
    /// The lock entry reflects the config as it stands after the fetch, so a
    /// container's stamped digest and path are part of it.
    pub async fn resolve_mcp_server(
        &self,
        name: &str,
        config: McpSource,
    ) -> Result<(ResolvedSource, McpLockEntry)> {
        let mut source = Source::from_mcp_config(name, config.clone())?;
        let resolved = source.fetch(&self.ctx, &self.store).await?;
        let stamped = source.mcp_config().unwrap_or(&config);
        let entry = McpLockEntry::from_resolved(name, stamped, &resolved);
        Ok((resolved, entry))
    }

    /// Fetches every record in name order and builds the new lockfile.
    ///
    /// Stops at the first failure; entries already fetched stay in the store.
    pub async fn resolve(
        &self,
        skills: &BTreeMap<String, SkillSource>,
        mcp_servers: &BTreeMap<String, McpSource>,
        previous: Option<&LockFile>,
    ) -> Result<Resolution> {
        let index = previous.map(LockFile::skill_index);
        let mut resolution = Resolution {
            skills: BTreeMap::new(),
            mcp_servers: BTreeMap::new(),
            lockfile: LockFile::new(),
        };

        for (name, config) in skills {
            tracing::debug!(target: "resolver", "resolving skill {}", name);
            let (resolved, entry) = self
                .resolve_skill(config, index.as_ref())
                .await
                .with_context(|| format!("resolving skill '{name}'"))?;
            resolution.lockfile.skills.push(entry);
            resolution.skills.insert(name.clone(), resolved);
        }

        for (name, config) in mcp_servers {
            tracing::debug!(target: "resolver", "resolving MCP server {}", name);
            let (resolved, entry) = self
                .resolve_mcp_server(name, config.clone())
                .await
                .with_context(|| format!("resolving MCP server '{name}'"))?;
            resolution.lockfile.mcp_servers.push(entry);
            resolution.mcp_servers.insert(name.clone(), resolved);
        }

        Ok(resolution)
    }
}
