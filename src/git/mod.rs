//! Git operations using the system `git` binary
//!
//! Like Cargo, apkg shells out to the user's `git` rather than linking a Git
//! library. This keeps credential helpers, SSH agents and proxy settings
//! working exactly as they do on the command line.
//!
//! The module provides the building blocks used by [`crate::source::GitSource`]:
//!
//! - [`parse_git_url`] turns any supported repository URL into a host plus
//!   repository path, which become store segments.
//! - [`resolve_ref`] normalizes a branch, tag, full hash or abbreviated hash to
//!   a full 40-character commit **before** anything is cached.
//! - [`clone_ref`] and [`fetch_commit`] materialize a single commit with a
//!   depth-1 history.
//!
//! # Ref Resolution
//!
//! | Ref shape | Strategy | Network |
//! |---|---|---|
//! | 40 hex chars | used as-is | none |
//! | 7-39 hex chars | `git ls-remote <url>`, prefix match | one call |
//! | anything else | `git ls-remote <url> <ref> <ref>^{}` | one call |
//!
//! `ls-remote` patterns match on trailing path components, so `main` also
//! lists `refs/heads/x/main`. Only an exact name counts: the ref itself when
//! it is fully qualified (`refs/...` or `HEAD`), otherwise `refs/heads/<ref>`
//! and then `refs/tags/<ref>`, the order `git clone --branch` uses.
//!
//! Annotated tags advertise both the tag object and a peeled `^{}` entry; the
//! peeled entry wins so that the result is always a commit.

use crate::core::ApkgError;
use crate::utils::{ToolCommand, validate_segments};
use anyhow::{Context, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Host recorded for repositories addressed by a filesystem path.
pub const LOCAL_HOST: &str = "local";

/// Suffix git uses for peeled (dereferenced) entries in `ls-remote` output.
const PEELED_SUFFIX: &str = "^{}";

/// A repository location split into store-friendly parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    /// `github.com`, `gitlab.example.com`, or [`LOCAL_HOST`].
    pub host: String,
    /// Path segments of the repository, `.git` stripped, nested groups kept.
    pub path: Vec<String>,
}

impl GitUrl {
    /// Store segments for this repository at `commit`:
    /// `repos/<host>/<path...>/<commit>`.
    #[must_use]
    pub fn store_segments(&self, commit: &str) -> Vec<String> {
        let mut segments = Vec::with_capacity(self.path.len() + 3);
        segments.push("repos".to_string());
        segments.push(self.host.clone());
        segments.extend(self.path.iter().cloned());
        segments.push(commit.to_string());
        segments
    }
}

/// Parses a repository URL into host and repository path.
///
/// Supported forms:
///
/// - `https://github.com/owner/repo.git` (and `http://`, `git://`)
/// - `ssh://git@github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git` (SSH shorthand)
/// - `file:///srv/git/repo.git` and bare filesystem paths, recorded under the
///   host `local`
///
/// # Errors
///
/// Fails if the URL is malformed or names no repository path, and with
/// [`ApkgError::InvalidSegment`] if a path component could escape the store.
///
/// # Examples
///
/// ```
/// use apkg::git::parse_git_url;
///
/// let parsed = parse_git_url("git@gitlab.com:group/sub/repo.git").unwrap();
/// assert_eq!(parsed.host, "gitlab.com");
/// assert_eq!(parsed.path, vec!["group", "sub", "repo"]);
/// ```
pub fn parse_git_url(url: &str) -> Result<GitUrl> {
    let parse_error = |reason: &str| anyhow::anyhow!("invalid git URL '{url}': {reason}");

    let (host, raw_path) = if let Some(idx) = url.find(':')
        && idx > 0
        && !url[..idx].contains('/')
        && !url.contains("://")
        && !crate::utils::is_local_path(url)
    {
        let host = &url[..idx];
        let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
        (host.to_string(), url[idx + 1..].to_string())
    } else if url.contains("://") {
        let parsed = url::Url::parse(url).map_err(|e| parse_error(&e.to_string()))?;
        let host = if parsed.scheme() == "file" {
            LOCAL_HOST.to_string()
        } else {
            parsed.host_str().ok_or_else(|| parse_error("missing host"))?.to_string()
        };
        (host, parsed.path().to_string())
    } else if crate::utils::is_local_path(url) {
        (LOCAL_HOST.to_string(), crate::utils::normalize_path_for_storage(Path::new(url)))
    } else {
        return Err(parse_error("not a recognized git URL"));
    };

    let trimmed = raw_path.trim_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let path: Vec<String> = trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect();

    if path.is_empty() {
        return Err(parse_error("missing repository path"));
    }
    validate_segments(&path)?;
    validate_segments(&[host.as_str()])?;

    Ok(GitUrl {
        host,
        path,
    })
}

/// Whether `s` is non-empty and entirely hexadecimal.
#[must_use]
pub fn is_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether `s` is a full 40-character commit hash.
#[must_use]
pub fn is_commit_hash(s: &str) -> bool {
    s.len() == 40 && is_hex_string(s)
}

/// Whether `s` looks like an abbreviated commit hash (7 to 39 hex characters).
#[must_use]
pub fn is_short_commit_hash(s: &str) -> bool {
    (7..40).contains(&s.len()) && is_hex_string(s)
}

/// One line of `git ls-remote` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub oid: String,
    pub name: String,
}

/// Parses `git ls-remote` output, skipping lines with fewer than two fields.
#[must_use]
pub fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(oid), Some(name)) => Some(RemoteRef {
                    oid: oid.to_string(),
                    name: name.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// A ref resolved against the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Full commit hash, lowercase.
    pub commit: String,
    /// Branch or tag name to hand to `git clone --branch`, when the ref names
    /// one. `None` for hashes and for refs outside `refs/heads` and
    /// `refs/tags`, which are fetched by commit instead.
    pub branch: Option<String>,
}

impl ResolvedRef {
    fn commit_only(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            branch: None,
        }
    }
}

/// Picks the commit for a named ref from filtered `ls-remote` output.
///
/// Only exact names are accepted; refs that merely end in `reference`
/// (`refs/heads/x/main` for `main`) are ignored. Within the chosen name a
/// peeled `^{}` entry wins over the tag object.
pub fn select_named_ref(url: &str, reference: &str, refs: &[RemoteRef]) -> Result<ResolvedRef> {
    let candidates = if reference == "HEAD" || reference.starts_with("refs/") {
        vec![reference.to_string()]
    } else {
        vec![format!("refs/heads/{reference}"), format!("refs/tags/{reference}")]
    };

    for name in &candidates {
        let Some(direct) = refs.iter().find(|r| r.name == *name) else {
            continue;
        };
        let peeled = format!("{name}{PEELED_SUFFIX}");
        let oid = refs.iter().find(|r| r.name == peeled).unwrap_or(direct).oid.as_str();
        let branch = name
            .strip_prefix("refs/heads/")
            .or_else(|| name.strip_prefix("refs/tags/"))
            .map(str::to_string);
        return Ok(ResolvedRef {
            commit: oid.to_ascii_lowercase(),
            branch,
        });
    }

    if !refs.is_empty() {
        tracing::debug!(
            target: "source::git",
            "{} only matched longer ref names in {}: {:?}",
            reference,
            url,
            refs.iter().map(|r| r.name.as_str()).collect::<Vec<_>>()
        );
    }
    Err(ApkgError::RefNotFound {
        reference: reference.to_string(),
        url: url.to_string(),
    }
    .into())
}

/// Expands an abbreviated hash against every advertised object.
///
/// Matching is case-insensitive. The same object advertised under several
/// names counts once.
pub fn select_short_hash(url: &str, prefix: &str, refs: &[RemoteRef]) -> Result<String> {
    let prefix = prefix.to_ascii_lowercase();
    let mut matches: Vec<String> = refs
        .iter()
        .map(|r| r.oid.to_ascii_lowercase())
        .filter(|oid| oid.starts_with(&prefix))
        .collect();
    matches.sort();
    matches.dedup();

    match matches.len() {
        0 => Err(ApkgError::RefNotFound {
            reference: prefix,
            url: url.to_string(),
        }
        .into()),
        1 => Ok(matches.remove(0)),
        _ => Err(ApkgError::AmbiguousShortHash {
            prefix,
            url: url.to_string(),
            matches,
        }
        .into()),
    }
}

/// Resolves `reference` in the repository at `url` to a full commit hash.
///
/// # Errors
///
/// [`ApkgError::RefNotFound`], [`ApkgError::AmbiguousShortHash`], or the
/// [`ApkgError::Subprocess`] raised by `git ls-remote`.
pub async fn resolve_ref(
    url: &str,
    reference: &str,
    cancel: &CancellationToken,
) -> Result<ResolvedRef> {
    if is_commit_hash(reference) {
        tracing::debug!(target: "source::git", "{} is a full commit hash", reference);
        return Ok(ResolvedRef::commit_only(reference.to_ascii_lowercase()));
    }

    if is_short_commit_hash(reference) {
        let output =
            ToolCommand::git().args(["ls-remote", url]).stdout_string(cancel).await?;
        let commit = select_short_hash(url, reference, &parse_ls_remote(&output))?;
        tracing::debug!(target: "source::git", "expanded {} to {}", reference, commit);
        return Ok(ResolvedRef::commit_only(commit));
    }

    let peeled = format!("{reference}{PEELED_SUFFIX}");
    let output = ToolCommand::git()
        .args(["ls-remote", url, reference, peeled.as_str()])
        .stdout_string(cancel)
        .await?;
    let resolved = select_named_ref(url, reference, &parse_ls_remote(&output))?;
    tracing::debug!(
        target: "source::git",
        "resolved {}@{} to {}",
        url,
        reference,
        resolved.commit
    );
    Ok(resolved)
}

/// Shallow-clones `reference` (a branch or tag name, unqualified) into
/// `dest`.
pub async fn clone_ref(
    url: &str,
    reference: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    ToolCommand::git()
        .args(["clone", "--depth", "1", "--branch", reference, url])
        .arg(dest)
        .execute_success(cancel)
        .await
        .with_context(|| format!("cloning {url} at {reference}"))?;
    Ok(())
}

/// Fetches exactly `commit` into a fresh repository at `dest`.
///
/// Requires the remote to serve unadvertised reachable objects, which the
/// major hosting providers do.
pub async fn fetch_commit(
    url: &str,
    commit: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    ToolCommand::git().arg("init").arg("--quiet").arg(dest).execute_success(cancel).await?;

    let steps: [&[&str]; 3] = [
        &["remote", "add", "origin", url],
        &["fetch", "--depth", "1", "origin", commit],
        &["checkout", "--quiet", "FETCH_HEAD"],
    ];
    for args in steps {
        ToolCommand::git()
            .arg("-C")
            .arg(dest)
            .args(args)
            .execute_success(cancel)
            .await
            .with_context(|| format!("fetching {commit} from {url}"))?;
    }
    Ok(())
}

/// Fails with [`ApkgError::CommitMismatch`] unless the checkout at `dest`
/// has `expected` as its `HEAD`.
pub async fn verify_head(
    url: &str,
    dest: &Path,
    expected: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let actual = ToolCommand::git()
        .arg("-C")
        .arg(dest)
        .args(["rev-parse", "HEAD"])
        .stdout_string(cancel)
        .await?
        .to_ascii_lowercase();
    if actual != expected.to_ascii_lowercase() {
        return Err(ApkgError::CommitMismatch {
            url: url.to_string(),
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// Deletes the `.git` directory of a checkout, leaving only the tree.
///
/// Repository metadata records fetch times and the fetch strategy, so it
/// would make the entry's integrity differ between machines.
pub async fn remove_metadata(dest: &Path) -> Result<()> {
    let metadata = dest.join(".git");
    tokio::fs::remove_dir_all(&metadata)
        .await
        .with_context(|| format!("removing {}", metadata.display()))
}
