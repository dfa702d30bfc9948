//! Core types shared by every layer of apkg
//!
//! This module holds the error taxonomy of the resolution subsystem and the
//! user-facing rendering of errors. It has no knowledge of individual source
//! types or of the store layout.
//!
//! # Error Management
//!
//! - **Strongly-typed errors** ([`ApkgError`]) for failures a caller can act on
//!   (ref not found, ambiguous short hash, subprocess failure, ...)
//! - **Context wrapping** with [`anyhow::Context`] so every error names the
//!   source and identity involved
//! - **User-friendly rendering** ([`ErrorContext`]) with actionable hints for
//!   the command line
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkg::core::{ApkgError, user_friendly_error};
//!
//! fn report(result: anyhow::Result<()>) {
//!     if let Err(e) = result {
//!         user_friendly_error(e).display();
//!     }
//! }
//!
//! report(Err(ApkgError::Cancelled.into()));
//! ```

pub mod error;

pub use error::{ApkgError, ErrorContext, user_friendly_error};
