//! Git repository sources.

use super::{FetchContext, ResolvedSource, materialize};
use crate::git::{self, is_hex_string, parse_git_url};
use crate::store::Store;
use anyhow::{Context, Result};

/// A directory inside a git repository at some ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    url: String,
    path: String,
    reference: String,
}

impl GitSource {
    /// `path` is relative to the repository root; empty means the root.
    pub fn new(
        url: impl Into<String>,
        path: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            reference: reference.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Resolves the ref, clones the commit on a cache miss, and hashes the
    /// sub-path.
    ///
    /// Entries hold the checked-out tree only; `.git` is removed before the
    /// entry is published.
    pub async fn fetch(&self, ctx: &FetchContext, store: &Store) -> Result<ResolvedSource> {
        let resolved = git::resolve_ref(&self.url, &self.reference, &ctx.cancel)
            .await
            .with_context(|| format!("resolving ref '{}' of {}", self.reference, self.url))?;
        let commit = resolved.commit;

        let segments = parse_git_url(&self.url)
            .with_context(|| format!("parsing git URL {}", self.url))?
            .store_segments(&commit);

        let commit_ref = commit.as_str();
        let branch = resolved.branch.as_deref().filter(|_| !is_hex_string(&self.reference));
        let installed = materialize(store, &segments, "git", |dest| async move {
            match branch {
                Some(branch) => git::clone_ref(&self.url, branch, &dest, &ctx.cancel).await?,
                None => git::fetch_commit(&self.url, commit_ref, &dest, &ctx.cancel).await?,
            }
            git::verify_head(&self.url, &dest, commit_ref, &ctx.cancel).await?;
            git::remove_metadata(&dest).await
        })
        .await
        .with_context(|| format!("cloning {}", self.url))?;

        if installed {
            tracing::debug!(target: "source::git", "cloned {} at {}", self.url, commit);
        }

        let sub_path: Vec<String> =
            self.path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();
        crate::utils::validate_segments(&sub_path)
            .with_context(|| format!("invalid sub-path '{}'", self.path))?;
        let mut content = segments;
        content.extend(sub_path);

        let integrity = store
            .hash_dir(&content)
            .await
            .with_context(|| format!("computing integrity of {}", self.path_label()))?;

        Ok(ResolvedSource {
            dir: store.path(&content),
            commit: Some(commit),
            reference: Some(self.reference.clone()),
            integrity: Some(integrity),
        })
    }

    fn path_label(&self) -> String {
        if self.path.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{}", self.url, self.path)
        }
    }
}
