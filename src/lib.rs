//! apkg - source resolution and content-addressable store for agent add-ons
//!
//! apkg fetches the add-ons a coding agent uses (skills and MCP servers) from
//! wherever they live and lays them out in a content-addressable store, so the
//! same content always lands at the same path and is installed at most once.
//!
//! # Architecture Overview
//!
//! ```text
//! manifest record ──> Source ──resolve──> identity ──> store segments
//!                                                          │
//!                        ResolvedSource <──hash── materialize (staged + rename)
//! ```
//!
//! - Mutable references (branches, `latest`, version ranges) are resolved to
//!   immutable identities (commits, versions, image digests) before anything
//!   touches the store.
//! - The identity becomes the store path, so a cache hit is just an existence
//!   check.
//! - Every entry is hashed into a `sha256:<hex>` integrity string recorded in
//!   the lockfile.
//!
//! # Core Modules
//!
//! - [`source`] - the [`Source`](source::Source) variants (git, npm, uv, go,
//!   OCI, static, local) and the reference parser
//! - [`store`] - the content-addressable store and directory hashing
//! - [`resolver`] - manifest records to store entries, with lockfile
//!   short-circuiting
//! - [`lockfile`] - the `apkg.lock` document
//! - [`manifest`] - skill and MCP server configuration records
//!
//! # Supporting Modules
//!
//! - [`git`] - git URL parsing and ref resolution via the system `git`
//! - [`container`] - docker/podman detection and image inspection
//! - [`config`] - global configuration (`~/.apkg/config.toml`, environment)
//! - [`core`] - error types and user-facing error rendering
//! - [`utils`] - subprocess execution and path validation
//! - [`cli`] - the `apkg` developer CLI
//!
//! # Store Layout
//!
//! ```text
//! ~/.apkg/
//! ├── repos/github.com/anthropics/skills/<commit>/
//! ├── npm/@modelcontextprotocol/server-everything/<version>/
//! ├── uv/mcp-server-git/<version>/
//! ├── go/github.com/org/server/<version>/
//! ├── oci/<name>/<digest>/
//! └── static/<name>/<sha256 of descriptor>/
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use apkg::source::{FetchContext, parse_reference};
//! use apkg::store::Store;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Store::default_location()?;
//! let ctx = FetchContext::new()?;
//! let (mut source, record) = parse_reference("anthropics/skills/skills/pdf@main")?;
//! let resolved = source.fetch(&ctx, &store).await?;
//! println!("{} -> {}", record.lock_key(), resolved.dir.display());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod core;
pub mod git;
pub mod lockfile;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod store;
pub mod utils;

// Shared by unit and integration tests.
#[doc(hidden)]
pub mod test_utils;
