//! Parsing of compact, user-typed references.
//!
//! ```text
//! ./skills/helper                  local directory
//! /abs/path/to/skill               local directory
//! anthropics/skills@main           https://github.com/anthropics/skills.git at main
//! anthropics/skills/skills/pdf@v2  sub-path skills/pdf at v2
//! ```

use super::{GitSource, LocalSource, Source};
use crate::core::ApkgError;
use crate::manifest::SkillSource;
use crate::utils::is_local_path;
use anyhow::Result;

/// Host that compact references resolve against.
pub const DEFAULT_GIT_HOST: &str = "https://github.com";

/// Parses `reference` into a ready-to-fetch source and the record a manifest
/// should store for it.
///
/// # Errors
///
/// [`ApkgError::Parse`] if a remote reference lacks `@ref`, has an empty
/// ref, or names fewer than two path segments.
///
/// # Examples
///
/// ```
/// use apkg::source::{Source, parse_reference};
///
/// let (source, record) = parse_reference("anthropics/skills/skills/pdf@main").unwrap();
/// assert_eq!(record.git.as_deref(), Some("https://github.com/anthropics/skills.git"));
/// assert_eq!(record.path, "skills/pdf");
/// assert!(matches!(source, Source::Git(_)));
/// ```
pub fn parse_reference(reference: &str) -> Result<(Source, SkillSource)> {
    if is_local_path(reference) {
        return Ok((Source::Local(LocalSource::new(reference)), SkillSource::local(reference)));
    }

    let parse_error = |reason: &str| ApkgError::Parse {
        input: reference.to_string(),
        reason: reason.to_string(),
    };

    let Some((location, git_ref)) = reference.split_once('@') else {
        return Err(parse_error("missing @ref").into());
    };
    if git_ref.is_empty() {
        return Err(parse_error("empty ref after '@'").into());
    }

    let segments: Vec<&str> = location.split('/').collect();
    if segments.len() < 2 || segments[..2].iter().any(|s| s.is_empty()) {
        return Err(parse_error("must name at least owner/repo").into());
    }

    let url = format!("{DEFAULT_GIT_HOST}/{}/{}.git", segments[0], segments[1]);
    let sub_path = segments[2..].join("/");

    let record = SkillSource::git(&url, &sub_path, git_ref);
    Ok((Source::Git(GitSource::new(url, sub_path, git_ref)), record))
}
