//! Validation of store path segments.
//!
//! Cache keys are built from user-controlled strings (package names, logical
//! server names, Go module paths). Each segment must stay a single, normal
//! path component so that a key can never address a location outside its
//! own subtree of the store.

use crate::core::ApkgError;
use anyhow::Result;
use std::path::{Component, Path};

/// Checks that `segment` is exactly one normal path component.
///
/// # Errors
///
/// Returns [`ApkgError::InvalidSegment`] for empty strings, `.`/`..`,
/// anything containing a path separator or NUL byte, and absolute paths.
///
/// # Examples
///
/// ```
/// use apkg::utils::validate_segment;
///
/// assert!(validate_segment("@modelcontextprotocol").is_ok());
/// assert!(validate_segment("1.2.3").is_ok());
/// assert!(validate_segment("..").is_err());
/// assert!(validate_segment("a/b").is_err());
/// ```
pub fn validate_segment(segment: &str) -> Result<()> {
    let reject = |reason: &str| -> Result<()> {
        Err(ApkgError::InvalidSegment {
            segment: segment.to_string(),
            reason: reason.to_string(),
        }
        .into())
    };

    if segment.is_empty() {
        return reject("empty");
    }
    if segment.contains('\0') {
        return reject("contains a NUL byte");
    }
    if segment.contains('/') || segment.contains('\\') {
        return reject("contains a path separator");
    }

    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::CurDir | Component::ParentDir), _) => {
            reject("refers to a relative directory")
        }
        _ => reject("is not a single path component"),
    }
}

/// Validates every segment of a cache key.
pub fn validate_segments<S: AsRef<str>>(segments: &[S]) -> Result<()> {
    segments.iter().try_for_each(|s| validate_segment(s.as_ref()))
}
