//! Content-addressable store for resolved packages
//!
//! The store is a plain directory tree. Every entry is addressed by an ordered
//! list of path *segments* chosen by a source so that identical resolved
//! identity maps to the identical path, and different identity to a different
//! path. The store itself knows nothing about sources.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.apkg/
//! ├── repos/<host>/<owner>/<repo>/<commit>/     # git checkouts
//! ├── npm/<@scope>/<name>/<version>/            # npm prefixes
//! ├── uv/<name>/<version>/.venv/                # isolated virtualenvs
//! ├── go/<module>/<path>/<version>/bin/         # go install output
//! ├── oci/<name>/<digest>/mcp.toml              # container descriptors
//! └── static/<name>/<sha256>/mcp.toml           # inline descriptors
//! ```
//!
//! # Immutability
//!
//! Once an entry has been fully written its content never changes. New content
//! is materialized into a temporary sibling (see [`Store::stage`]) and moved
//! into place with a single `rename`, so readers never observe a half-written
//! entry. Two processes racing on the same key both produce byte-identical
//! content; the loser of the rename discards its copy.
//!
//! The only exception is the `mcp.toml` descriptor side-file, which sources
//! rewrite on every fetch so that configuration edits take effect without a
//! re-install.
//!
//! # Integrity
//!
//! [`Store::hash_dir`] produces `sha256:<hex>` over the sorted relative file
//! paths of a tree, each path's bytes followed by the file's bytes. The digest
//! is independent of traversal order and stable across machines.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkg::store::Store;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Store::new("/tmp/apkg-store");
//! let segs = ["static", "my-server", "abc123"];
//!
//! if !store.exists(&segs).await? {
//!     store.ensure_dir(&segs).await;
//!     store.write_file(b"transport = \"stdio\"\n", 0o644, &["static", "my-server", "abc123", "mcp.toml"]).await?;
//! }
//! let integrity = store.hash_dir(&segs).await?;
//! assert!(integrity.starts_with("sha256:"));
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::core::ApkgError;
use crate::utils::normalize_path_for_storage;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use walkdir::WalkDir;

/// Prefix of every integrity digest.
pub const HASH_PREFIX: &str = "sha256:";

/// Permission bits of a published entry directory.
pub const ENTRY_DIR_MODE: u32 = 0o755;

/// Root of the content-addressable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// A store rooted at `root`. Nothing is created until first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// A store at the configured location.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.store_dir)
    }

    /// A store at the default per-user location (`~/.apkg`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::config::default_root()?))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `segments` under the root. Pure; performs no I/O.
    #[must_use]
    pub fn path<S: AsRef<Path>>(&self, segments: &[S]) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment);
        }
        path
    }

    /// Whether anything exists at `segments`.
    ///
    /// # Errors
    ///
    /// "Not found" is `Ok(false)`; any other I/O failure (permissions, ...)
    /// is returned.
    pub async fn exists<S: AsRef<Path>>(&self, segments: &[S]) -> Result<bool> {
        let path = self.path(segments);
        match async_fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("checking {}", path.display())),
        }
    }

    /// Recursively creates the directory at `segments`.
    ///
    /// Best-effort: failures are logged, not returned. Callers that need the
    /// directory immediately write into it, and that write fails loudly.
    pub async fn ensure_dir<S: AsRef<Path>>(&self, segments: &[S]) {
        let path = self.path(segments);
        if let Err(e) = async_fs::create_dir_all(&path).await {
            tracing::debug!(target: "store", "create_dir_all {} failed: {}", path.display(), e);
        }
    }

    /// Recursively deletes whatever is at `segments`. Idempotent and
    /// best-effort; used for rollback.
    pub async fn remove<S: AsRef<Path>>(&self, segments: &[S]) {
        let path = self.path(segments);
        let result = match async_fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => async_fs::remove_dir_all(&path).await,
            Ok(_) => async_fs::remove_file(&path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(target: "store", "failed to remove {}: {}", path.display(), e);
        }
    }

    /// Integrity digest of the directory at `segments`.
    ///
    /// # Errors
    ///
    /// [`ApkgError::IntegrityCompute`] if the directory does not exist or a
    /// file cannot be read.
    pub async fn hash_dir<S: AsRef<Path>>(&self, segments: &[S]) -> Result<String> {
        let dir = self.path(segments);
        tokio::task::spawn_blocking(move || hash_directory(&dir))
            .await
            .context("directory hashing task panicked")?
    }

    /// Writes `data` to the file at `segments` with permission bits `mode`.
    /// The parent directory must already exist.
    pub async fn write_file<S: AsRef<Path>>(
        &self,
        data: &[u8],
        mode: u32,
        segments: &[S],
    ) -> Result<()> {
        let path = self.path(segments);
        async_fs::write(&path, data).await.with_context(|| format!("writing {}", path.display()))?;
        set_mode(&path, mode).await
    }

    /// Reads the file at `segments`.
    pub async fn read_file<S: AsRef<Path>>(&self, segments: &[S]) -> Result<Vec<u8>> {
        let path = self.path(segments);
        async_fs::read(&path).await.with_context(|| format!("reading {}", path.display()))
    }

    /// Reserves an empty temporary sibling of the entry at `segments`.
    ///
    /// Content is written into [`StagedEntry::path`] and published with
    /// [`StagedEntry::commit`]. Dropping the staged entry without committing
    /// deletes the temporary directory, which is the rollback path for every
    /// failed install.
    pub async fn stage<S: AsRef<Path>>(&self, segments: &[S]) -> Result<StagedEntry> {
        let target = self.path(segments);
        let (Some(parent), Some(leaf)) = (target.parent(), target.file_name()) else {
            anyhow::bail!("cannot stage the store root itself");
        };
        async_fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;

        let prefix = format!(".{}.tmp-", leaf.to_string_lossy());
        let parent = parent.to_path_buf();
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&parent)
        })
        .await
        .context("staging task panicked")?
        .with_context(|| format!("creating staging directory for {}", target.display()))?;

        tracing::debug!(
            target: "store",
            "staging {} in {}",
            target.display(),
            temp.path().display()
        );
        Ok(StagedEntry {
            temp,
            target,
        })
    }
}

/// How a staged entry ended up in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call's content was moved into place.
    Installed,
    /// Another writer published the entry first; ours was discarded.
    AlreadyPresent,
}

/// A temporary directory that becomes a store entry on commit.
#[derive(Debug)]
pub struct StagedEntry {
    temp: tempfile::TempDir,
    target: PathBuf,
}

impl StagedEntry {
    /// Where content should be written.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Final location of the entry.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically moves the staged content to its final location.
    ///
    /// The staging directory is created private (0700); it is opened up to
    /// [`ENTRY_DIR_MODE`] before the rename so the store can be shared.
    pub async fn commit(self) -> Result<CommitOutcome> {
        let Self {
            temp,
            target,
        } = self;
        set_mode(temp.path(), ENTRY_DIR_MODE).await?;
        let staged = temp.keep();

        match async_fs::rename(&staged, &target).await {
            Ok(()) => Ok(CommitOutcome::Installed),
            Err(e) => {
                let _ = async_fs::remove_dir_all(&staged).await;
                if async_fs::metadata(&target).await.is_ok() {
                    tracing::debug!(
                        target: "store",
                        "{} was published concurrently; discarding staged copy",
                        target.display()
                    );
                    Ok(CommitOutcome::AlreadyPresent)
                } else {
                    Err(e).with_context(|| format!("publishing {}", target.display()))
                }
            }
        }
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    async_fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Synchronous integrity digest of `dir`; see [`Store::hash_dir`].
///
/// Regular files contribute their content. Symbolic links are not followed:
/// they contribute their target path, so links that dangle or point outside
/// the tree still hash deterministically.
pub fn hash_directory(dir: &Path) -> Result<String> {
    let integrity_err = |source: std::io::Error| ApkgError::IntegrityCompute {
        path: dir.to_path_buf(),
        source,
    };

    let meta = std::fs::metadata(dir).map_err(integrity_err)?;
    if !meta.is_dir() {
        return Err(integrity_err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        ))
        .into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| integrity_err(e.into()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        files.push((
            normalize_path_for_storage(relative),
            entry.path().to_path_buf(),
            entry.file_type().is_symlink(),
        ));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative, absolute, is_symlink) in &files {
        hasher.update(relative.as_bytes());
        if *is_symlink {
            let target = std::fs::read_link(absolute).map_err(integrity_err)?;
            hasher.update(normalize_path_for_storage(&target).as_bytes());
        } else {
            let content = std::fs::read(absolute).map_err(integrity_err)?;
            hasher.update(&content);
        }
    }

    tracing::debug!(target: "store", "hashed {} files under {}", files.len(), dir.display());
    Ok(format!("{HASH_PREFIX}{}", hex::encode(hasher.finalize())))
}
