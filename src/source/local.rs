//! Skills in a local directory, used in place.

use super::ResolvedSource;
use crate::core::ApkgError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A directory on the local filesystem. Never copied into the store and
/// never hashed, since its owner may edit it at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolutizes the path and checks that it is an existing directory.
    ///
    /// # Errors
    ///
    /// [`ApkgError::LocalPath`] if the path is missing or not a directory.
    pub async fn fetch(&self) -> Result<ResolvedSource> {
        let absolute = std::path::absolute(&self.path)
            .with_context(|| format!("resolving {}", self.path.display()))?;

        let metadata = match tokio::fs::metadata(&absolute).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApkgError::LocalPath {
                    path: absolute,
                    reason: "does not exist".to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("checking {}", absolute.display()));
            }
        };

        if !metadata.is_dir() {
            return Err(ApkgError::LocalPath {
                path: absolute,
                reason: "is not a directory".to_string(),
            }
            .into());
        }

        Ok(ResolvedSource {
            dir: absolute,
            commit: None,
            reference: None,
            integrity: None,
        })
    }
}
