//! Real installs against public registries and hosts.
//!
//! These need the corresponding toolchain on `PATH` and network access, so
//! they only run with `--ignored`.

use crate::common::{FileAssert, TestEnv};
use anyhow::Result;
use apkg::manifest::{MCP_FILE_NAME, McpKind, McpSource, Transport};
use apkg::source::{Source, parse_reference};

fn package(spec: &str) -> McpSource {
    McpSource::new(Transport::Stdio, McpKind::Package { package: spec.to_string() })
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_github_skill() -> Result<()> {
    let env = TestEnv::new()?;
    let (mut source, _) = parse_reference("anthropics/skills/skills/pdf@main")?;

    let first = source.fetch(&env.ctx, &env.store).await?;
    let second = source.fetch(&env.ctx, &env.store).await?;

    assert!(first.dir.starts_with(env.store.root().join("repos/github.com/anthropics/skills")));
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
#[ignore = "requires network access and npm"]
async fn test_npm_install() -> Result<()> {
    let env = TestEnv::new()?;
    let mut source = Source::from_mcp_config(
        "everything",
        package("npm:@modelcontextprotocol/server-everything"),
    )?;

    let resolved = source.fetch(&env.ctx, &env.store).await?;
    let prefix = env.store.root().join("npm/@modelcontextprotocol/server-everything");
    assert!(resolved.dir.starts_with(prefix));
    FileAssert::exists(resolved.dir.join("node_modules")).await;
    FileAssert::contains(resolved.dir.join(MCP_FILE_NAME), "name = \"everything\"").await;
    Ok(())
}

#[tokio::test]
#[ignore = "requires network access and uv"]
async fn test_uv_install() -> Result<()> {
    let env = TestEnv::new()?;
    let mut source = Source::from_mcp_config("git", package("uv:mcp-server-git==2026.1.14"))?;

    let resolved = source.fetch(&env.ctx, &env.store).await?;
    assert!(resolved.dir.ends_with("uv/mcp-server-git/2026.1.14"));
    FileAssert::exists(resolved.dir.join(".venv/bin/mcp-server-git")).await;
    Ok(())
}

#[tokio::test]
#[ignore = "requires network access and go"]
async fn test_go_install() -> Result<()> {
    let env = TestEnv::new()?;
    let mut source = Source::from_mcp_config(
        "github",
        package("go:github.com/github/github-mcp-server/cmd/github-mcp-server@latest"),
    )?;

    let resolved = source.fetch(&env.ctx, &env.store).await?;
    assert!(!resolved.dir.ends_with("latest"), "version should be resolved");
    FileAssert::exists(resolved.dir.join("bin/github-mcp-server")).await;
    Ok(())
}
