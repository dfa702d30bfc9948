//! MCP server sources that can be exercised without a package manager:
//! PyPI resolution against a mock index, cache hits on pre-seeded entries,
//! and npm, Go and container sources driven by scripted binaries.

use crate::common::{FileAssert, TestEnv};
use anyhow::Result;
use apkg::core::ApkgError;
use apkg::manifest::{MCP_FILE_NAME, McpKind, McpSource, Transport};
use apkg::source::{Source, UvSource};
use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

/// Serves `/pypi/{name}/json` on a random local port. Only `mcp-server-fetch`
/// exists; everything else is a 404. Returns the base URL.
async fn start_pypi_mock() -> String {
    async fn project(UrlPath(name): UrlPath<String>) -> Result<Json<Value>, StatusCode> {
        match name.as_str() {
            "mcp-server-fetch" => Ok(Json(json!({ "info": { "version": "2025.4.7" } }))),
            "mcp-server-empty" => Ok(Json(json!({ "info": { "version": "" } }))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().route("/pypi/{name}/json", get(project));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.ok();
    });
    format!("http://127.0.0.1:{port}")
}

fn uv(spec: &str) -> UvSource {
    UvSource::new(
        spec,
        McpSource::new(Transport::Stdio, McpKind::Package { package: format!("uv:{spec}") })
            .with_name("git"),
    )
}

#[tokio::test]
async fn test_pypi_latest_version_lookup() -> Result<()> {
    let mut env = TestEnv::new()?;
    env.ctx.pypi_index_url = start_pypi_mock().await;

    assert_eq!(uv("mcp-server-fetch").resolve_version(&env.ctx).await?, "2025.4.7");
    Ok(())
}

#[tokio::test]
async fn test_pypi_errors_are_registry_errors() -> Result<()> {
    let mut env = TestEnv::new()?;
    env.ctx.pypi_index_url = start_pypi_mock().await;

    for spec in ["no-such-package", "mcp-server-empty"] {
        let err = uv(spec).resolve_version(&env.ctx).await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::Registry { .. })),
            "{spec}: {err:#}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_pinned_uv_hit_needs_no_network_or_uv() -> Result<()> {
    let mut env = TestEnv::new()?;
    // Nothing listens here; any HTTP request would fail the fetch.
    env.ctx.pypi_index_url = "http://127.0.0.1:9".to_string();

    let segments = ["uv", "mcp-server-git", "2026.1.14"];
    std::fs::create_dir_all(env.store.path(&segments).join(".venv/bin"))?;
    std::fs::write(env.store.path(&segments).join(".venv/bin/mcp-server-git"), "#!/bin/sh\n")?;

    let mut source = Source::Uv(uv("mcp-server-git==2026.1.14"));
    let first = source.fetch(&env.ctx, &env.store).await?;
    let second = source.fetch(&env.ctx, &env.store).await?;

    assert!(first.dir.ends_with("uv/mcp-server-git/2026.1.14"));
    assert_eq!(first, second);
    FileAssert::contains(first.dir.join(MCP_FILE_NAME), "uv:mcp-server-git==2026.1.14").await;
    Ok(())
}

#[tokio::test]
async fn test_descriptor_is_rewritten_on_hit() -> Result<()> {
    let env = TestEnv::new()?;
    let segments = ["uv", "mcp-server-git", "2026.1.14"];
    std::fs::create_dir_all(env.store.path(&segments))?;

    let mut plain = Source::Uv(uv("mcp-server-git==2026.1.14"));
    let before = plain.fetch(&env.ctx, &env.store).await?;

    let package = McpKind::Package {
        package: "uv:mcp-server-git==2026.1.14".to_string(),
    };
    let mut config = McpSource::new(Transport::Stdio, package).with_name("git");
    config.args = vec!["--repository".to_string(), "/work".to_string()];
    let mut with_args = Source::Uv(UvSource::new("mcp-server-git==2026.1.14", config));
    let after = with_args.fetch(&env.ctx, &env.store).await?;

    assert_eq!(before.dir, after.dir);
    assert_ne!(before.integrity, after.integrity);
    FileAssert::contains(after.dir.join(MCP_FILE_NAME), "--repository").await;
    Ok(())
}

#[cfg(unix)]
mod container {
    use super::*;
    use crate::common::{DirAssert, write_script};
    use apkg::lockfile::McpLockEntry;
    use apkg::manifest::ContainerConfig;
    use apkg::resolver::Resolver;
    use std::path::{Path, PathBuf};

    const DIGEST: &str = "4b1d0c0ffee0123456789abcdef0123456789abcdef0123456789abcdef0123";

    /// A docker stand-in: every image is present, and `--format` prints a
    /// fixed digest. Invocations are appended to `calls.log`.
    fn scripted_engine(dir: &Path) -> PathBuf {
        let script = format!(
            "echo \"$*\" >> '{}'\n\
             if [ \"$3\" = \"--format\" ]; then echo sha256:{DIGEST}; fi\n\
             exit 0\n",
            dir.join("calls.log").display()
        );
        write_script(dir.join("fake-docker"), &script).unwrap()
    }

    fn container_config(port: u16) -> McpSource {
        McpSource::new(
            Transport::Http,
            McpKind::Container(ContainerConfig {
                image: "ghcr.io/example/fetch:1".to_string(),
                port: Some(port),
                ..ContainerConfig::default()
            }),
        )
    }

    #[tokio::test]
    async fn test_container_digest_is_stamped() -> Result<()> {
        let mut env = TestEnv::new()?;
        let engine = scripted_engine(&env.path(""));
        env.ctx.container_engine = Some(engine.display().to_string());

        let mut source = Source::from_mcp_config("fetch", container_config(8080))?;
        let resolved = source.fetch(&env.ctx, &env.store).await?;

        assert!(resolved.dir.ends_with(Path::new("oci").join("fetch").join(DIGEST)));
        let data = std::fs::read(resolved.dir.join(MCP_FILE_NAME))?;
        let descriptor = McpSource::from_descriptor(&data)?;
        match descriptor.kind {
            McpKind::Container(c) => {
                assert_eq!(c.digest.as_deref(), Some(DIGEST));
                assert_eq!(c.path.as_deref(), Some("/mcp"));
                assert_eq!(c.port, Some(8080));
            }
            other => panic!("expected container descriptor, got {other:?}"),
        }

        let calls = std::fs::read_to_string(env.path("calls.log"))?;
        assert!(!calls.contains("pull"), "present image must not be pulled: {calls}");

        DirAssert::no_staging_leftovers(env.store.path(&["oci", "fetch"]));
        let entries: Vec<_> = std::fs::read_dir(&resolved.dir)?.flatten().collect();
        assert_eq!(entries.len(), 1, "entry holds only the descriptor");
        Ok(())
    }

    #[tokio::test]
    async fn test_container_config_change_rewrites_descriptor() -> Result<()> {
        let mut env = TestEnv::new()?;
        let engine = scripted_engine(&env.path(""));
        env.ctx.container_engine = Some(engine.display().to_string());

        let first = Source::from_mcp_config("fetch", container_config(8080))?
            .fetch(&env.ctx, &env.store)
            .await?;
        let second = Source::from_mcp_config("fetch", container_config(9090))?
            .fetch(&env.ctx, &env.store)
            .await?;

        assert_eq!(first.dir, second.dir);
        FileAssert::contains(second.dir.join(MCP_FILE_NAME), "port = 9090").await;
        Ok(())
    }

    #[tokio::test]
    async fn test_resolver_records_container_entry() -> Result<()> {
        let mut env = TestEnv::new()?;
        let engine = scripted_engine(&env.path(""));
        env.ctx.container_engine = Some(engine.display().to_string());
        let resolver = Resolver::new(env.store.clone(), env.ctx.clone());

        let (resolved, entry): (_, McpLockEntry) =
            resolver.resolve_mcp_server("fetch", container_config(8080)).await?;

        assert_eq!(entry.image.as_deref(), Some("ghcr.io/example/fetch:1"));
        assert_eq!(entry.port, Some(8080));
        assert_eq!(entry.install_path, resolved.dir);
        assert_eq!(entry.integrity, resolved.integrity);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_engine_override() -> Result<()> {
        let mut env = TestEnv::new()?;
        env.ctx.container_engine = Some(env.path("no-such-engine").display().to_string());

        let err = Source::from_mcp_config("fetch", container_config(8080))?
            .fetch(&env.ctx, &env.store)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::EngineNotFound { .. })));
        Ok(())
    }
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use crate::common::{DirAssert, write_script};
    use std::path::PathBuf;

    fn calls(env: &TestEnv) -> Vec<String> {
        std::fs::read_to_string(env.path("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// `npm view` reports 1.2.3; `npm install --prefix <dir> <pkg>` creates
    /// a package directory under the prefix.
    fn scripted_npm(env: &TestEnv) -> PathBuf {
        let script = format!(
            "echo \"$*\" >> '{}'\n\
             case \"$1\" in\n\
               view) echo '\"1.2.3\"' ;;\n\
               install) mkdir -p \"$3/node_modules/server\" ;;\n\
             esac\n",
            env.path("calls.log").display()
        );
        write_script(env.path("npm"), &script).unwrap()
    }

    /// `go list` fails as it does for package paths below a module root;
    /// `go install` drops a binary into `$GOBIN`.
    fn scripted_go(env: &TestEnv) -> PathBuf {
        let script = format!(
            "echo \"$*\" >> '{}'\n\
             case \"$1\" in\n\
               list) echo 'go: not a module root' >&2; exit 1 ;;\n\
               install) mkdir -p \"$GOBIN\" && touch \"$GOBIN/tool\" ;;\n\
             esac\n",
            env.path("calls.log").display()
        );
        write_script(env.path("go"), &script).unwrap()
    }

    #[tokio::test]
    async fn test_second_npm_fetch_skips_install() -> Result<()> {
        let mut env = TestEnv::new()?;
        env.ctx = env.ctx.clone().with_tool("npm", scripted_npm(&env));

        let package = McpKind::Package {
            package: "npm:@example/server".to_string(),
        };
        let config = McpSource::new(Transport::Stdio, package);
        let first = Source::from_mcp_config("server", config.clone())?
            .fetch(&env.ctx, &env.store)
            .await?;
        let second = Source::from_mcp_config("server", config)?
            .fetch(&env.ctx, &env.store)
            .await?;

        assert_eq!(first, second);
        assert!(first.dir.ends_with("npm/@example/server/1.2.3"));
        FileAssert::exists(first.dir.join("node_modules/server")).await;
        FileAssert::contains(first.dir.join(MCP_FILE_NAME), "npm:@example/server").await;

        let calls = calls(&env);
        let installs: Vec<_> = calls.iter().filter(|c| c.starts_with("install")).collect();
        let views = calls.iter().filter(|c| c.starts_with("view")).count();
        assert_eq!(installs.len(), 1, "{calls:?}");
        assert!(installs[0].ends_with("@example/server@1.2.3"), "{calls:?}");
        assert_eq!(views, 2, "{calls:?}");
        Ok(())
    }

    #[tokio::test]
    async fn test_go_falls_back_to_version_expression() -> Result<()> {
        let mut env = TestEnv::new()?;
        env.ctx = env.ctx.clone().with_tool("go", scripted_go(&env));

        let package = McpKind::Package {
            package: "go:github.com/org/tool/cmd/tool".to_string(),
        };
        let resolved = Source::from_mcp_config("tool", McpSource::new(Transport::Stdio, package))?
            .fetch(&env.ctx, &env.store)
            .await?;

        assert!(resolved.dir.ends_with("go/github.com/org/tool/cmd/tool/latest"));
        FileAssert::exists(resolved.dir.join("bin/tool")).await;

        let calls = calls(&env);
        assert!(calls[0].starts_with("list -m"), "{calls:?}");
        assert_eq!(calls[1], "install github.com/org/tool/cmd/tool@latest");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_npm_install_leaves_nothing() -> Result<()> {
        let mut env = TestEnv::new()?;
        let script = "case \"$1\" in\n\
                        view) echo '\"2.0.0\"' ;;\n\
                        install) mkdir -p \"$3/partial\"; echo 'E404' >&2; exit 1 ;;\n\
                      esac\n";
        let npm = write_script(env.path("npm"), script)?;
        env.ctx = env.ctx.clone().with_tool("npm", npm);

        let package = McpKind::Package {
            package: "npm:broken".to_string(),
        };
        let err = Source::from_mcp_config("broken", McpSource::new(Transport::Stdio, package))?
            .fetch(&env.ctx, &env.store)
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::Subprocess { .. })));
        assert!(!env.store.path(&["npm", "broken", "2.0.0"]).exists());
        DirAssert::no_staging_leftovers(env.store.path(&["npm", "broken"]));
        Ok(())
    }
}
