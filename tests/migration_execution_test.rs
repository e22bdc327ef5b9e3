mod common;

use common::MockDriver;
use schemaflow_core::driver::Driver;
use schemaflow_core::error::{ErrorCode, SchemaflowError};
use schemaflow_core::migration::{execute_migration, MigrationError, MigrationExecutor};
use schemaflow_core::models::{
    DbType, MigrationHistoryFind, MigrationInfo, MigrationSource, MigrationStatus, MigrationType,
};

fn info(version: &str, migration_type: MigrationType) -> MigrationInfo {
    MigrationInfo {
        version: version.to_string(),
        namespace: "shop".to_string(),
        database: "shop".to_string(),
        environment: "prod".to_string(),
        source: MigrationSource::Vcs,
        migration_type,
        description: format!("migration {version}"),
        creator: "dev@example.com".to_string(),
        issue_id: Some(1),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_applies_and_records_history() {
    let driver = MockDriver::new(DbType::MySql);

    let first = execute_migration(&driver, &driver, &info("001", MigrationType::Migrate), "CREATE TABLE a (id INT);")
        .await
        .unwrap();
    let second = execute_migration(&driver, &driver, &info("002", MigrationType::Migrate), "CREATE TABLE b (id INT);")
        .await
        .unwrap();

    assert!(!first.already_applied);
    assert_eq!(second.updated_schema, "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\n");
    assert_eq!(
        driver.stored_rows(),
        vec![
            (1, "0000.0000.0000-001".to_string(), MigrationStatus::Done),
            (2, "0000.0000.0000-002".to_string(), MigrationStatus::Done),
        ]
    );

    let history = driver
        .find_history_list(&MigrationHistoryFind {
            id: Some(second.history_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(history[0].version, "002");
    assert_eq!(history[0].schema_prev, "CREATE TABLE a (id INT);\n");
    assert_eq!(history[0].schema, second.updated_schema);
}

#[tokio::test]
async fn test_same_issue_reapplying_is_a_no_op() {
    let driver = MockDriver::new(DbType::MySql);
    let migration = info("001", MigrationType::Migrate);

    let first = execute_migration(&driver, &driver, &migration, "CREATE TABLE a (id INT);")
        .await
        .unwrap();
    let again = execute_migration(&driver, &driver, &migration, "CREATE TABLE a (id INT);")
        .await
        .unwrap();

    assert!(again.already_applied);
    assert_eq!(again.history_id, first.history_id);
    assert_eq!(driver.executed().len(), 1);

    let mut other_issue = migration.clone();
    other_issue.issue_id = Some(2);
    let err = execute_migration(&driver, &driver, &other_issue, "CREATE TABLE a (id INT);")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MigrationFailed);
}

#[tokio::test]
async fn test_failure_is_recorded_and_force_rearms_the_row() {
    let driver = MockDriver::new(DbType::MySql);
    driver.fail_statements_containing("BROKEN");
    let migration = info("001", MigrationType::Migrate);

    let err = execute_migration(&driver, &driver, &migration, "CREATE BROKEN TABLE")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DbExecutionError);
    assert_eq!(driver.stored_rows()[0].2, MigrationStatus::Failed);

    let err = execute_migration(&driver, &driver, &migration, "CREATE TABLE a (id INT);")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchemaflowError::Migration(MigrationError::PreviouslyFailed { .. })
    ));

    let mut forced = migration.clone();
    forced.force = true;
    let outcome = execute_migration(&driver, &driver, &forced, "CREATE TABLE a (id INT);")
        .await
        .unwrap();

    let rows = driver.stored_rows();
    assert_eq!(rows.len(), 1, "force reuses the existing row");
    assert_eq!(rows[0].2, MigrationStatus::Done);
    assert_eq!(outcome.history_id, 1);
}

#[tokio::test]
async fn test_data_migrations_never_honor_force() {
    let driver = MockDriver::new(DbType::MySql);
    driver.fail_statements_containing("BROKEN");
    let mut data = info("001", MigrationType::Data);

    assert!(execute_migration(&driver, &driver, &data, "UPDATE BROKEN SET a = 1")
        .await
        .is_err());

    data.force = true;
    let err = execute_migration(&driver, &driver, &data, "UPDATE t SET a = 1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MigrationFailed);
    assert!(driver.executed().is_empty());
}

#[tokio::test]
async fn test_out_of_order_versions_are_rejected() {
    let driver = MockDriver::new(DbType::MySql);
    execute_migration(&driver, &driver, &info("002", MigrationType::Migrate), "CREATE TABLE b (id INT);")
        .await
        .unwrap();

    let err = execute_migration(&driver, &driver, &info("001", MigrationType::Migrate), "CREATE TABLE a (id INT);")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MigrationOutOfOrder);
    assert_eq!(driver.stored_rows().len(), 1, "nothing recorded for a rejected attempt");
}

#[tokio::test]
async fn test_baseline_records_schema_without_executing() {
    let driver = MockDriver::new(DbType::MySql);
    execute_migration(&driver, &driver, &info("001", MigrationType::Migrate), "CREATE TABLE a (id INT);")
        .await
        .unwrap();

    let baseline = execute_migration(&driver, &driver, &info("002", MigrationType::Baseline), "CREATE TABLE ignored (id INT);")
        .await
        .unwrap();
    assert_eq!(baseline.updated_schema, "CREATE TABLE a (id INT);\n");
    assert_eq!(driver.executed().len(), 1);

    execute_migration(&driver, &driver, &info("003", MigrationType::Migrate), "CREATE TABLE c (id INT);")
        .await
        .unwrap();
    let sequences: Vec<i64> = driver.stored_rows().iter().map(|row| row.0).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_empty_statement_and_create_database() {
    let driver = MockDriver::new(DbType::Postgres);

    let mut create = info("001", MigrationType::Migrate);
    create.create_database = true;
    let outcome = driver
        .execute_migration(&create, "CREATE DATABASE shop;")
        .await
        .unwrap();
    assert_eq!(outcome.1, "CREATE DATABASE shop;\n");

    let history = driver
        .find_migration_history_list(&MigrationHistoryFind {
            database: Some("shop".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(history[0].schema_prev, "", "no dump before the database exists");

    execute_migration(&driver, &driver, &info("002", MigrationType::Migrate), "   ")
        .await
        .unwrap();
    assert_eq!(driver.executed().len(), 1);
    assert_eq!(driver.stored_rows()[1].2, MigrationStatus::Done);
}

#[tokio::test]
async fn test_semantic_versions_are_padded_and_suffixed() {
    let driver = MockDriver::new(DbType::MySql);
    let mut semantic = info("1.2.3", MigrationType::Migrate);
    semantic.use_semantic_version = true;
    semantic.semantic_version_suffix = "20240101120000".to_string();

    execute_migration(&driver, &driver, &semantic, "CREATE TABLE a (id INT);")
        .await
        .unwrap();

    assert_eq!(driver.stored_rows()[0].1, "0001.0002.0003-20240101120000");
    let history = driver
        .find_history_list(&MigrationHistoryFind {
            version: Some("1.2.3".to_string()),
            use_semantic_version: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, "1.2.3");
    assert!(history[0].use_semantic_version);
    assert_eq!(history[0].semantic_version_suffix, "20240101120000");

    let mut too_large = semantic.clone();
    too_large.version = "10000.0.0".to_string();
    let err = execute_migration(&driver, &driver, &too_large, "SELECT 1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid);
}

#[tokio::test]
async fn test_history_list_is_most_recent_first_with_limit() {
    let driver = MockDriver::new(DbType::MySql);
    for version in ["001", "002", "003"] {
        execute_migration(&driver, &driver, &info(version, MigrationType::Migrate), "SELECT 1;")
            .await
            .unwrap();
    }
    let mut other = info("001", MigrationType::Migrate);
    other.namespace = "analytics".to_string();
    other.database = "analytics".to_string();
    execute_migration(&driver, &driver, &other, "SELECT 1;").await.unwrap();

    let all = driver
        .find_history_list(&MigrationHistoryFind::default())
        .await
        .unwrap();
    let keys: Vec<(String, i64)> = all.iter().map(|h| (h.namespace.clone(), h.sequence)).collect();
    assert_eq!(
        keys,
        vec![
            ("analytics".to_string(), 1),
            ("shop".to_string(), 3),
            ("shop".to_string(), 2),
            ("shop".to_string(), 1),
        ]
    );

    let latest = driver
        .find_history_list(&MigrationHistoryFind {
            database: Some("shop".to_string()),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version, "003");
}

fn semantic(version: &str, suffix: &str, migration_type: MigrationType, issue_id: i64) -> MigrationInfo {
    let mut info = info(version, migration_type);
    info.use_semantic_version = true;
    info.semantic_version_suffix = suffix.to_string();
    info.issue_id = Some(issue_id);
    info
}

#[tokio::test]
async fn test_semantic_version_reused_with_new_suffix() {
    let driver = MockDriver::new(DbType::MySql);
    execute_migration(
        &driver,
        &driver,
        &semantic("1.2.0", "20240101000000", MigrationType::Baseline, 1),
        "",
    )
    .await
    .unwrap();

    // re-baseline the same version after drift, from another issue
    let rebaseline = execute_migration(
        &driver,
        &driver,
        &semantic("1.2.0", "20240202000000", MigrationType::Baseline, 2),
        "",
    )
    .await
    .unwrap();
    assert!(!rebaseline.already_applied);

    // and again from the first issue
    let again = execute_migration(
        &driver,
        &driver,
        &semantic("1.2.0", "20240303000000", MigrationType::Baseline, 1),
        "",
    )
    .await
    .unwrap();
    assert!(!again.already_applied);
    assert_eq!(
        driver.stored_rows(),
        vec![
            (1, "0001.0002.0000-20240101000000".to_string(), MigrationStatus::Done),
            (2, "0001.0002.0000-20240202000000".to_string(), MigrationStatus::Done),
            (3, "0001.0002.0000-20240303000000".to_string(), MigrationStatus::Done),
        ]
    );

    // the exact stored key is still a duplicate
    let replay = execute_migration(
        &driver,
        &driver,
        &semantic("1.2.0", "20240303000000", MigrationType::Baseline, 1),
        "",
    )
    .await
    .unwrap();
    assert!(replay.already_applied);
    assert_eq!(replay.history_id, again.history_id);

    let listed = driver
        .find_history_list(&MigrationHistoryFind {
            version: Some("1.2.0".to_string()),
            use_semantic_version: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
}

#[tokio::test]
async fn test_zero_version_string_is_not_a_semantic_prefix() {
    let driver = MockDriver::new(DbType::MySql);
    execute_migration(&driver, &driver, &info("0", MigrationType::Migrate), "CREATE TABLE a (id INT);")
        .await
        .unwrap();

    let mut zero = info("0.0.0", MigrationType::Migrate);
    zero.issue_id = Some(2);
    let outcome = execute_migration(&driver, &driver, &zero, "CREATE TABLE b (id INT);")
        .await
        .unwrap();
    assert!(!outcome.already_applied);

    let listed = driver
        .find_history_list(&MigrationHistoryFind {
            version: Some("0.0.0".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, "0.0.0");
}
