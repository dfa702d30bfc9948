//! Common test utilities and fixtures for apkg integration tests
//!
//! # Quick Start
//!
//! ```rust,ignore
//! if !git_available() {
//!     return Ok(());
//! }
//! let env = TestEnv::new()?;
//! let repo = SkillRepo::create(env.path("sources"))?;
//! let mut source = Source::Git(GitSource::new(repo.url(), "skills/pdf", "main"));
//! let resolved = source.fetch(&env.ctx, &env.store).await?;
//! ```
//!
//! ## Helper Summary
//!
//! - `TestGit` - thin wrapper over the `git` CLI for building fixtures
//! - `SkillRepo` - bare repository with a `main` branch, lightweight tag
//!   `v1.0`, and annotated tag `v2.0`, all on one commit
//! - `TestEnv` - temporary store plus a default `FetchContext`
//! - `write_script` - executable stand-ins for external tools
//! - `FileAssert` / `DirAssert` - filesystem assertions

// Not every test module uses every helper.
#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use apkg::source::FetchContext;
use apkg::store::Store;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Whether a usable `git` binary is on `PATH`. Git-backed tests return early
/// when it is not.
pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
}

/// Git command builder for tests
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initialize a repository whose first commit lands on `main`
    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        self.run_git_command(&["symbolic-ref", "HEAD", "refs/heads/main"], "Failed to set HEAD")?;
        Ok(())
    }

    /// Configure identity and disable signing so commits work on any host
    pub fn config_user(&self) -> Result<()> {
        for (key, value) in [
            ("user.email", "test@apkg.example"),
            ("user.name", "Test User"),
            ("commit.gpgsign", "false"),
            ("tag.gpgsign", "false"),
        ] {
            self.run_git_command(&["config", key, value], &format!("Failed to set {key}"))?;
        }
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Create a lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Create an annotated tag, which is its own object pointing at HEAD
    pub fn annotated_tag(&self, tag_name: &str, message: &str) -> Result<()> {
        self.run_git_command(
            &["tag", "-a", tag_name, "-m", message],
            &format!("Failed to create annotated tag: {tag_name}"),
        )?;
        Ok(())
    }

    /// Create `branch` at HEAD and switch to it
    pub fn create_branch(&self, branch: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", "-b", branch],
            &format!("Failed to create branch: {branch}"),
        )?;
        Ok(())
    }

    pub fn checkout(&self, reference: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", reference],
            &format!("Failed to check out {reference}"),
        )?;
        Ok(())
    }

    pub fn get_commit_hash(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get commit hash")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Object id a ref points at without peeling (the tag object for
    /// annotated tags)
    pub fn ref_object(&self, reference: &str) -> Result<String> {
        let output = self.run_git_command(
            &["rev-parse", reference],
            &format!("Failed to resolve {reference}"),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Clone current repository to a bare repository that serves any commit
    /// by hash
    pub fn clone_to_bare(&self, target_path: &Path) -> Result<()> {
        let output = Command::new("git")
            .arg("clone")
            .arg("--bare")
            .arg("--quiet")
            .arg(&self.repo_path)
            .arg(target_path)
            .output()
            .context("Failed to create bare repository")?;
        if !output.status.success() {
            bail!("Failed to create bare repository: {}", String::from_utf8_lossy(&output.stderr));
        }
        TestGit::new(target_path).run_git_command(
            &["config", "uploadpack.allowAnySHA1InWant", "true"],
            "Failed to allow fetching by hash",
        )?;
        Ok(())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

/// A bare repository holding one skill.
///
/// Layout of the single commit:
///
/// ```text
/// README.md
/// skills/pdf/SKILL.md
/// skills/pdf/scripts/extract.py
/// ```
///
/// `main`, `v1.0` (lightweight), and `v2.0` (annotated) all point at it.
pub struct SkillRepo {
    pub bare: PathBuf,
    pub commit: String,
    pub work: TestGit,
}

impl SkillRepo {
    /// Builds the fixture under `dir`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let work_path = dir.join("work");
        std::fs::create_dir_all(work_path.join("skills/pdf/scripts"))?;
        std::fs::write(work_path.join("README.md"), "# Skills\n")?;
        std::fs::write(
            work_path.join("skills/pdf/SKILL.md"),
            "---\nname: pdf\ndescription: Read and fill PDF forms\n---\n\n# PDF\n",
        )?;
        std::fs::write(work_path.join("skills/pdf/scripts/extract.py"), "print('extract')\n")?;

        let work = TestGit::new(&work_path);
        work.init()?;
        work.config_user()?;
        work.add_all()?;
        work.commit("Initial commit")?;
        work.tag("v1.0")?;
        work.annotated_tag("v2.0", "Release 2.0")?;
        let commit = work.get_commit_hash()?;

        let bare = dir.join("skills.git");
        work.clone_to_bare(&bare)?;

        Ok(Self {
            bare,
            commit,
            work,
        })
    }

    /// The URL sources should use: the bare repository's path.
    pub fn url(&self) -> String {
        self.bare.display().to_string()
    }
}

/// A temporary store and a fetch context with default settings
pub struct TestEnv {
    temp_dir: TempDir,
    pub store: Store,
    pub ctx: FetchContext,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        apkg::test_utils::init_test_logging(None);
        let temp_dir = TempDir::new()?;
        let store = Store::new(temp_dir.path().join("store"));
        Ok(Self {
            temp_dir,
            store,
            ctx: FetchContext::new()?,
        })
    }

    /// A path inside the environment's temporary directory (not the store)
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }
}

/// Writes an executable shell script at `path` and returns the path.
///
/// Used to stand in for package managers and container engines.
#[cfg(unix)]
pub fn write_script(path: impl AsRef<Path>, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;
    let path = path.as_ref();
    std::fs::write(path, format!("#!/bin/sh\n{body}"))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path.to_path_buf())
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    pub async fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(tokio::fs::metadata(path).await.is_ok(), "Expected file to exist: {}", path.display());
    }

    pub async fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(
            tokio::fs::metadata(path).await.is_err(),
            "Expected file to not exist: {}",
            path.display()
        );
    }

    pub async fn contains(path: impl AsRef<Path>, expected: &str) {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
        assert!(
            content.contains(expected),
            "Expected {} to contain '{expected}', got:\n{content}",
            path.display()
        );
    }
}

/// Directory assertion helpers
pub struct DirAssert;

impl DirAssert {
    /// Assert no staging directories (`.<leaf>.tmp-*`) were left in `dir`
    pub fn no_staging_leftovers(dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.contains(".tmp-"), "staging directory left behind: {}", name);
        }
    }
}
