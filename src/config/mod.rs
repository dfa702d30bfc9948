//! Global configuration for the resolution subsystem.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults (`~/.apkg`, `https://pypi.org`, engine auto-detection)
//! 2. The global file `~/.apkg/config.toml`
//! 3. Environment variables (`APKG_STORE_DIR`, `APKG_PYPI_URL`,
//!    `APKG_CONTAINER_ENGINE`)
//!
//! ```toml
//! # ~/.apkg/config.toml
//! store_dir = "/var/cache/apkg"
//! pypi_index_url = "https://pypi.internal.example.com"
//! container_engine = "podman"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the home directory holding the store and config.
pub const DEFAULT_ROOT: &str = ".apkg";

/// Name of the global config file inside [`DEFAULT_ROOT`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Overrides the store root.
pub const STORE_DIR_ENV: &str = "APKG_STORE_DIR";

/// Overrides the PyPI JSON API base URL.
pub const PYPI_URL_ENV: &str = "APKG_PYPI_URL";

/// Forces a specific container engine binary.
pub const CONTAINER_ENGINE_ENV: &str = "APKG_CONTAINER_ENGINE";

/// Default PyPI base URL; the JSON endpoint is `<base>/pypi/<name>/json`.
pub const DEFAULT_PYPI_INDEX_URL: &str = "https://pypi.org";

/// Effective configuration after all layers are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the content-addressable store.
    pub store_dir: PathBuf,
    /// Base URL of the PyPI JSON API.
    pub pypi_index_url: String,
    /// Container engine override (binary name or path).
    pub container_engine: Option<String>,
}

/// On-disk shape of `config.toml`; every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi_index_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_engine: Option<String>,
}

impl GlobalConfigFile {
    /// Load a config file. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

impl Config {
    /// Resolve the configuration from defaults, `~/.apkg/config.toml`, and
    /// the process environment.
    pub fn load() -> Result<Self> {
        let root = default_root()?;
        let file = GlobalConfigFile::load(&root.join(CONFIG_FILE_NAME))?;
        Ok(Self::from_layers(root, file, |key| std::env::var(key).ok()))
    }

    /// Apply the layers with an explicit environment lookup.
    pub fn from_layers(
        default_root: PathBuf,
        file: GlobalConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

        let store_dir = non_empty(STORE_DIR_ENV)
            .map(PathBuf::from)
            .or(file.store_dir)
            .unwrap_or(default_root);
        let pypi_index_url = non_empty(PYPI_URL_ENV)
            .or(file.pypi_index_url)
            .unwrap_or_else(|| DEFAULT_PYPI_INDEX_URL.to_string());
        let container_engine = non_empty(CONTAINER_ENGINE_ENV).or(file.container_engine);

        Self {
            store_dir,
            pypi_index_url: pypi_index_url.trim_end_matches('/').to_string(),
            container_engine,
        }
    }
}

/// `~/.apkg`, the default store root.
pub fn default_root() -> Result<PathBuf> {
    let home = dirs::home_dir().context("determining home directory")?;
    Ok(home.join(DEFAULT_ROOT))
}
