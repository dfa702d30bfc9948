//! Error types for source resolution and the content-addressable store.
//!
//! Public operations in this crate return [`anyhow::Result`]. Failures that a
//! caller may want to react to programmatically are raised as [`ApkgError`]
//! variants and then wrapped with context naming the source and identity
//! involved. Because `anyhow` preserves the root error through context layers,
//! callers can still discriminate with [`anyhow::Error::downcast_ref`]:
//!
//! ```rust,no_run
//! use apkg::core::ApkgError;
//!
//! fn is_ambiguous(err: &anyhow::Error) -> bool {
//!     matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::AmbiguousShortHash { .. }))
//! }
//! ```

use colored::Colorize;
use std::path::PathBuf;
use thiserror::Error;

/// Typed failure modes of the resolution subsystem.
#[derive(Debug, Error)]
pub enum ApkgError {
    /// A branch, tag, or commit prefix is not advertised by the remote.
    #[error("ref '{reference}' not found in {url}")]
    RefNotFound {
        /// The ref as given by the user or manifest
        reference: String,
        /// Repository URL that was queried
        url: String,
    },

    /// A checkout landed on a different commit than the ref resolved to.
    #[error("checkout of {url} is at {actual}, expected {expected}")]
    CommitMismatch {
        /// Repository URL that was cloned
        url: String,
        /// Commit the ref resolved to
        expected: String,
        /// Commit `HEAD` points at after the checkout
        actual: String,
    },

    /// A short hash prefix matches two or more distinct objects.
    #[error("short hash '{prefix}' is ambiguous in {url} (matches {matches:?})")]
    AmbiguousShortHash {
        /// The abbreviated hash
        prefix: String,
        /// Repository URL that was queried
        url: String,
        /// Every distinct full hash starting with `prefix`
        matches: Vec<String>,
    },

    /// An MCP descriptor does not map to any known source variant.
    #[error("unsupported MCP server configuration for '{name}': {reason}")]
    UnsupportedConfig {
        /// Logical server name
        name: String,
        /// What made the configuration unusable
        reason: String,
    },

    /// An external tool exited with a non-zero status.
    #[error("`{program} {args}` failed ({status}){}", format_stderr(.stderr))]
    Subprocess {
        /// Binary that was invoked
        program: String,
        /// Space-joined arguments
        args: String,
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// Hashing a directory failed, usually because it vanished.
    #[error("failed to compute integrity of {}", .path.display())]
    IntegrityCompute {
        /// Directory being hashed
        path: PathBuf,
        /// Underlying I/O or walk failure
        #[source]
        source: std::io::Error,
    },

    /// A local source path is missing or not a directory.
    #[error("local source path {}: {reason}", .path.display())]
    LocalPath {
        /// Absolute path that was checked
        path: PathBuf,
        /// "does not exist", "is not a directory", ...
        reason: String,
    },

    /// A compact reference does not follow `owner/repo[/path]@ref`.
    #[error("invalid reference '{input}': {reason} (expected owner/repo[/path]@ref, e.g. owner/repo/path@main)")]
    Parse {
        /// The rejected input
        input: String,
        /// Which part of the grammar was violated
        reason: String,
    },

    /// A cache key segment would escape or corrupt the store layout.
    #[error("invalid store segment '{segment}': {reason}")]
    InvalidSegment {
        /// The rejected segment
        segment: String,
        /// Why it was rejected
        reason: String,
    },

    /// A package registry answered with an unusable response.
    #[error("registry request for '{package}' failed: {reason}")]
    Registry {
        /// Package being resolved
        package: String,
        /// Status code or decoding failure
        reason: String,
    },

    /// No container engine is available.
    #[error("no container engine found: {reason}")]
    EngineNotFound {
        /// Which lookup failed
        reason: String,
    },

    /// The fetch context was cancelled while work was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl ApkgError {
    /// A short, actionable hint for the terminal, when one exists.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::RefNotFound { .. } => {
                Some("Check that the branch or tag exists on the remote, or pin a full commit hash")
            }
            Self::AmbiguousShortHash { .. } => {
                Some("Use a longer commit prefix or the full 40-character hash")
            }
            Self::Parse { .. } => Some("Use owner/repo/path@ref or a ./relative or /absolute path"),
            Self::EngineNotFound { .. } => {
                Some("Install docker or podman, or set APKG_CONTAINER_ENGINE")
            }
            Self::LocalPath { .. } => Some("Local sources must point at an existing directory"),
            _ => None,
        }
    }
}

/// User-facing rendering of an error chain with an optional hint.
#[derive(Debug)]
pub struct ErrorContext {
    error: anyhow::Error,
    suggestion: Option<String>,
}

impl ErrorContext {
    /// Wrap an error, picking up the suggestion of a typed root cause.
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        let suggestion =
            error.downcast_ref::<ApkgError>().and_then(ApkgError::suggestion).map(str::to_string);
        Self {
            error,
            suggestion,
        }
    }

    /// The hint, if any.
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Print the error chain and hint to stderr.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".yellow(), cause);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{} {}", "hint:".cyan().bold(), suggestion);
        }
    }
}

/// Convert any error into its user-facing form.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    ErrorContext::new(error)
}
