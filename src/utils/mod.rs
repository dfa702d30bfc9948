//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`command`] - Cancellable execution of external tools with captured stderr
//! - [`path_validation`] - Validation of store path segments

use std::path::Path;

pub mod command;
pub mod path_validation;

pub use command::ToolCommand;
pub use path_validation::{validate_segment, validate_segments};

/// Determines if a reference names a local filesystem path.
///
/// Local references start with `./` or `../`, or are already absolute.
/// Everything else is treated as a remote reference.
///
/// # Examples
///
/// ```
/// use apkg::utils::is_local_path;
///
/// assert!(is_local_path("./local/skill"));
/// assert!(is_local_path("../parent/skill"));
/// assert!(is_local_path("/absolute/skill"));
///
/// assert!(!is_local_path("owner/repo@main"));
/// assert!(!is_local_path("my-skill"));
/// ```
#[must_use]
pub fn is_local_path(reference: &str) -> bool {
    reference.starts_with("./")
        || reference.starts_with("../")
        || Path::new(reference).is_absolute()
}

/// Render a relative path with forward slashes regardless of platform.
///
/// Used wherever a path feeds into a hash or a persisted record, so that the
/// same tree produces the same bytes on every machine.
///
/// # Examples
///
/// ```
/// use apkg::utils::normalize_path_for_storage;
/// use std::path::Path;
///
/// assert_eq!(normalize_path_for_storage(Path::new("skills/pdf/SKILL.md")), "skills/pdf/SKILL.md");
/// ```
#[must_use]
pub fn normalize_path_for_storage(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        rendered.into_owned()
    } else {
        rendered.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
