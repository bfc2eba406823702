use std::fs;

use sql_mapper::prelude::*;
use tempfile::tempdir;

const USER_SQL: &str = "\
-- name=get_user
SELECT id, name, email FROM users WHERE id = :id
-- name=get_all
SELECT id, name, email FROM users
";

#[test]
fn loads_user_file_and_returns_each_block() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("user.sql"), USER_SQL)?;

    let mut registry = StatementRegistry::with_root(dir.path());
    assert_eq!(registry.load_file("user.sql")?, 2);

    assert_eq!(
        &*registry.get("get_user")?,
        "SELECT id, name, email FROM users WHERE id = :id\n"
    );
    assert_eq!(&*registry.get("get_all")?, "SELECT id, name, email FROM users\n");
    for name in registry.names() {
        assert!(!registry.get(name)?.contains("-- name="));
    }
    assert!(matches!(
        registry.get("get_users"),
        Err(SqlMapperError::StatementNotFound(_))
    ));
    Ok(())
}

#[test]
fn load_dir_reads_sql_files_in_order_and_skips_others() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("b_orders.sql"), "-- name=list_orders\nSELECT * FROM orders\n")?;
    fs::write(dir.path().join("a_users.sql"), USER_SQL)?;
    fs::write(dir.path().join("notes.txt"), "-- name=ignored\nSELECT 1\n")?;

    let mut registry = StatementRegistry::with_root(dir.path());
    assert_eq!(registry.load_dir()?, 3);
    assert_eq!(registry.names(), ["get_all", "get_user", "list_orders"]);
    assert!(!registry.contains("ignored"));

    // reloading the directory replaces, it does not collide with itself
    assert_eq!(registry.load_dir()?, 3);
    assert_eq!(registry.len(), 3);
    Ok(())
}

#[test]
fn collisions_across_files_follow_policy() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.sql"), USER_SQL)?;
    fs::write(
        dir.path().join("b.sql"),
        "-- name=get_all\nSELECT id FROM users ORDER BY id\n",
    )?;

    let mut strict = StatementRegistry::with_root(dir.path());
    let err = strict.load_dir().unwrap_err();
    assert!(matches!(err, SqlMapperError::DuplicateStatement { ref name, .. } if name == "get_all"));
    assert_eq!(&*strict.get("get_all")?, "SELECT id, name, email FROM users\n");

    let mut lenient =
        StatementRegistry::with_root(dir.path()).with_collision_policy(CollisionPolicy::Override);
    lenient.load_dir()?;
    assert_eq!(&*lenient.get("get_all")?, "SELECT id FROM users ORDER BY id\n");
    Ok(())
}

#[test]
fn duplicate_name_in_one_file_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("dupe.sql"),
        "-- name=q\nSELECT 1\n-- name=q\nSELECT 2\n",
    )?;
    let mut registry = StatementRegistry::with_root(dir.path());
    assert!(matches!(
        registry.load_file("dupe.sql"),
        Err(SqlMapperError::DuplicateStatement { .. })
    ));
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn load_sql_reads_whole_files_or_single_blocks() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("user.sql"), USER_SQL)?;
    let registry = StatementRegistry::with_root(dir.path());

    assert_eq!(registry.load_sql("user.sql", None)?, USER_SQL);
    assert_eq!(
        registry.load_sql("user.sql", Some("get_all"))?,
        "SELECT id, name, email FROM users\n"
    );
    assert!(matches!(
        registry.load_sql("user.sql", Some("nope")),
        Err(SqlMapperError::StatementNotFound(_))
    ));
    assert!(matches!(
        registry.load_sql("missing.sql", None),
        Err(SqlMapperError::Io { .. })
    ));
    Ok(())
}
