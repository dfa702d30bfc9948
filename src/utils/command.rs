//! Cancellable subprocess execution for external tools.
//!
//! Every external binary this crate drives (git, npm, uv, go, docker/podman)
//! goes through [`ToolCommand`]. The builder mirrors `std::process::Command`
//! but always captures stdout/stderr, never inherits stdin, and races the
//! child against a [`CancellationToken`]: when the token fires the child is
//! killed and [`ApkgError::Cancelled`] is returned.

use crate::core::ApkgError;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio_util::sync::CancellationToken;

/// Builder for a single external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Start building an invocation of `program`.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Shorthand for `ToolCommand::new("git")`.
    #[must_use]
    pub fn git() -> Self {
        Self::new("git")
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Add an environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs.push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn display_args(&self) -> String {
        self.args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
    }

    /// Run to completion and return the raw output regardless of exit status.
    ///
    /// # Errors
    ///
    /// Fails if the binary cannot be spawned or the token is cancelled before
    /// the child exits.
    pub async fn output(self, cancel: &CancellationToken) -> Result<Output> {
        if cancel.is_cancelled() {
            return Err(ApkgError::Cancelled.into());
        }

        let program = self.program_name();
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(target: "process", "running {} {}", program, self.display_args());

        let child = cmd.spawn().with_context(|| format!("failed to start `{program}`"))?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(target: "process", "cancelled {}", program);
                Err(ApkgError::Cancelled.into())
            }
            output = child.wait_with_output() => {
                output.with_context(|| format!("waiting for `{program}`"))
            }
        }
    }

    /// Run and require a zero exit status.
    ///
    /// # Errors
    ///
    /// Non-zero exits become [`ApkgError::Subprocess`] carrying the trimmed
    /// standard error.
    pub async fn execute_success(self, cancel: &CancellationToken) -> Result<Output> {
        let program = self.program_name();
        let args = self.display_args();
        let output = self.output(cancel).await?;

        if !output.status.success() {
            return Err(ApkgError::Subprocess {
                program,
                args,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }

    /// Run, require success, and return trimmed stdout as UTF-8.
    pub async fn stdout_string(self, cancel: &CancellationToken) -> Result<String> {
        let output = self.execute_success(cancel).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run and report only whether the tool exited successfully.
    ///
    /// Used for cheap existence probes (`image inspect`) where a failure is
    /// an answer rather than an error. Cancellation still propagates.
    pub async fn succeeds(self, cancel: &CancellationToken) -> Result<bool> {
        let output = self.output(cancel).await?;
        Ok(output.status.success())
    }
}
