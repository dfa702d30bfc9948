//! Compact references and local sources.

use crate::common::TestEnv;
use anyhow::Result;
use apkg::core::ApkgError;
use apkg::source::{Source, parse_reference};

#[test]
fn test_parse_compact_reference() -> Result<()> {
    let (source, record) = parse_reference("anthropics/skills/skills/pdf@main")?;
    assert!(matches!(source, Source::Git(_)));
    assert_eq!(record.git.as_deref(), Some("https://github.com/anthropics/skills.git"));
    assert_eq!(record.path, "skills/pdf");
    assert_eq!(record.reference.as_deref(), Some("main"));
    assert_eq!(record.lock_key(), "https://github.com/anthropics/skills.git|skills/pdf");
    Ok(())
}

#[test]
fn test_reference_without_ref_is_rejected() {
    let err = parse_reference("anthropics/skills").unwrap_err();
    assert!(matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::Parse { .. })));
}

#[tokio::test]
async fn test_local_reference_is_used_in_place() -> Result<()> {
    let env = TestEnv::new()?;
    let skill = env.path("skills/helper");
    std::fs::create_dir_all(&skill)?;
    std::fs::write(skill.join("SKILL.md"), "# helper\n")?;

    let (mut source, record) = parse_reference(&skill.display().to_string())?;
    assert!(record.git.is_none());

    let resolved = source.fetch(&env.ctx, &env.store).await?;
    assert_eq!(resolved.dir, skill);
    assert!(resolved.integrity.is_none());
    assert!(resolved.commit.is_none());
    assert!(!env.store.root().exists(), "local sources never touch the store");
    Ok(())
}

#[tokio::test]
async fn test_local_reference_must_be_a_directory() -> Result<()> {
    let env = TestEnv::new()?;
    let file = env.path("SKILL.md");
    std::fs::write(&file, "# not a directory\n")?;

    let (mut source, _) = parse_reference(&file.display().to_string())?;
    let err = source.fetch(&env.ctx, &env.store).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApkgError>(), Some(ApkgError::LocalPath { .. })));
    Ok(())
}
