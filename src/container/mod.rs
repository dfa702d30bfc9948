//! Local container engine detection and image inspection
//!
//! Images are handled through whichever engine CLI is installed. Detection
//! order:
//!
//! 1. An explicit override (`APKG_CONTAINER_ENGINE` or `container_engine` in
//!    the global config), either a binary name looked up on `PATH` or a path
//! 2. `docker` on `PATH`
//! 3. `podman` on `PATH`

use crate::core::ApkgError;
use crate::utils::ToolCommand;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Engines probed, in preference order, when no override is set.
pub const ENGINE_CANDIDATES: [&str; 2] = ["docker", "podman"];

/// A detected container engine CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    /// Absolute path to the binary.
    pub path: PathBuf,
    /// Binary name, e.g. `docker`.
    pub name: String,
}

impl Engine {
    /// Detects an engine using the process `PATH`.
    pub fn detect(override_engine: Option<&str>) -> Result<Self> {
        Self::detect_in(override_engine, std::env::var_os("PATH").as_deref())
    }

    /// Detects an engine searching `path_var` (a `PATH`-style list).
    ///
    /// # Errors
    ///
    /// [`ApkgError::EngineNotFound`] if the override cannot be found or no
    /// candidate is installed.
    pub fn detect_in(override_engine: Option<&str>, path_var: Option<&OsStr>) -> Result<Self> {
        if let Some(requested) = override_engine.filter(|s| !s.is_empty()) {
            let path =
                find_executable(requested, path_var).ok_or_else(|| ApkgError::EngineNotFound {
                    reason: format!("'{requested}' is not on PATH"),
                })?;
            let name = Path::new(requested)
                .file_name()
                .map_or_else(|| requested.to_string(), |n| n.to_string_lossy().into_owned());
            return Ok(Self {
                path,
                name,
            });
        }

        for candidate in ENGINE_CANDIDATES {
            if let Some(path) = find_executable(candidate, path_var) {
                tracing::debug!(target: "source::oci", "using container engine {}", path.display());
                return Ok(Self {
                    path,
                    name: candidate.to_string(),
                });
            }
        }

        Err(ApkgError::EngineNotFound {
            reason: "install docker or podman, or set APKG_CONTAINER_ENGINE".to_string(),
        }
        .into())
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.path)
    }

    /// Whether `image` is present locally.
    pub async fn has_image(&self, image: &str, cancel: &CancellationToken) -> Result<bool> {
        self.command().args(["image", "inspect", image]).succeeds(cancel).await
    }

    /// Pulls `image` unless it is already present locally.
    pub async fn ensure_image(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        if self.has_image(image, cancel).await? {
            tracing::debug!(target: "source::oci", "image {} already present", image);
            return Ok(());
        }
        tracing::debug!(target: "source::oci", "pulling {}", image);
        self.command()
            .args(["pull", image])
            .execute_success(cancel)
            .await
            .with_context(|| format!("pulling image {image}"))?;
        Ok(())
    }

    /// The local image ID as bare hex, without the `sha256:` prefix.
    pub async fn image_digest(&self, image: &str, cancel: &CancellationToken) -> Result<String> {
        let id = self
            .command()
            .args(["image", "inspect", "--format", "{{.Id}}", image])
            .stdout_string(cancel)
            .await
            .with_context(|| format!("inspecting image {image}"))?;
        Ok(strip_digest_prefix(&id).to_string())
    }
}

pub(crate) fn strip_digest_prefix(id: &str) -> &str {
    id.strip_prefix("sha256:").unwrap_or(id)
}

/// Resolves `program` to an executable file. Names containing a path
/// separator are checked directly; bare names are searched in `path_var`.
fn find_executable(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
