//! Integration test suite for apkg
//!
//! End-to-end tests of fetching into a real store. Git-backed tests build
//! bare repositories on disk and skip when `git` is not installed; tests that
//! need npm, uv, go, a container engine, or the public network are ignored
//! by default.
//!
//! ```bash
//! cargo test --test integration
//! cargo test --test integration -- --ignored   # network and toolchains
//! ```
//!
//! # Test Organization
//!
//! - **git**: ref equivalence, sub-paths, idempotence, failure cleanup
//! - **lockfile**: short-circuiting through a previous lockfile
//! - **mcp**: static isolation, PyPI resolution, container stamping
//! - **reference**: compact reference parsing and local sources
//! - **network**: real installs against public registries (ignored)

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod mcp;
mod network;
mod reference;
