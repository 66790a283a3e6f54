//! MySQL schema source integration tests.
//!
//! This test suite covers:
//! - Database, table and column listing
//! - `SHOW CREATE VIEW` retrieval and error classification
//! - A full audit run against a live server

#![cfg(feature = "mysql")]
#![allow(clippy::unwrap_used)]

use labsdb_auditor_core::{
    AuditConfig, Column, HostSpec, Model, MySqlConnector, MySqlCredentials, MySqlSchemaSource,
    Report, ReportRunner, Result, SchemaSource, Table,
    error::AuditorError,
    reports::ViewFinding,
    viewdef::{clean_view_definition, table_from_view_sql},
};
use sqlx::MySqlPool;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use testcontainers_modules::{mysql::Mysql, testcontainers::runners::AsyncRunner};

const FIXTURE: &[&str] = &[
    "CREATE DATABASE enwiki",
    "CREATE DATABASE enwiki_p",
    "CREATE TABLE enwiki.logging (
        log_id INT PRIMARY KEY,
        log_type VARBINARY(32) NOT NULL,
        log_deleted TINYINT NOT NULL DEFAULT 0,
        log_user INT,
        log_comment VARBINARY(255)
    )",
    "CREATE TABLE enwiki.user (user_id INT PRIMARY KEY, user_password TINYBLOB)",
    "CREATE VIEW enwiki_p.logging AS
        SELECT log_id AS log_id, IF(log_deleted = 4, NULL, log_user) AS log_user,
               log_comment AS log_comment
        FROM enwiki.logging WHERE log_type <> 'suppress'",
    "CREATE TABLE enwiki_p.user (user_id INT)",
];

/// Helper function to wait for MySQL to be ready
async fn wait_for_mysql_ready(database_url: &str, max_attempts: u32) -> Result<()> {
    let mut attempts = 0;
    while attempts < max_attempts {
        if let Ok(pool) = MySqlPool::connect(database_url).await {
            if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                pool.close().await;
                return Ok(());
            }
            pool.close().await;
        }
        attempts += 1;
        if attempts < max_attempts {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    Err(AuditorError::connection_failed(
        "MySQL container",
        std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("MySQL failed to become ready after {} attempts", max_attempts),
        ),
    ))
}

async fn load_fixture(port: u16) -> Result<()> {
    let database_url = format!("mysql://root@127.0.0.1:{}/test", port);
    wait_for_mysql_ready(&database_url, 60).await?;

    let pool = MySqlPool::connect(&database_url).await.unwrap();
    for statement in FIXTURE {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
    Ok(())
}

fn credentials() -> MySqlCredentials {
    MySqlCredentials::new("root", None, Duration::from_secs(30))
}

fn logging_model() -> Table {
    Table::new("logging")
        .with_column(Column::whitelisted("log_id"))
        .with_column(Column::null_if("log_user", "log_deleted = 4"))
}

#[tokio::test]
async fn test_mysql_metadata_queries() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    load_fixture(port).await?;

    let host = HostSpec::parse(&format!("127.0.0.1:{}", port))?;
    let source = MySqlSchemaSource::connect(&host, &credentials()).await?;

    let databases = source.list_databases().await?;
    assert!(databases.contains(&"enwiki".to_string()));
    assert!(databases.contains(&"enwiki_p".to_string()));

    let tables = source.list_tables("enwiki").await?;
    assert_eq!(tables, vec!["logging".to_string(), "user".to_string()]);

    let columns = source.list_columns("enwiki", "logging").await?;
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["log_id", "log_type", "log_deleted", "log_user", "log_comment"]
    );
    assert!(columns[0].column_type.starts_with("int"));

    let err = source.list_tables("nosuchwiki").await.unwrap_err();
    assert!(err.is_unknown_database(), "unexpected error: {}", err);

    let err = source.show_create_view("enwiki_p", "user").await.unwrap_err();
    assert!(
        matches!(err, AuditorError::NotAView { .. }),
        "unexpected error: {}",
        err
    );

    source.close().await;
    Ok(())
}

#[tokio::test]
async fn test_mysql_view_definition_parses() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    load_fixture(port).await?;

    let host = HostSpec::parse(&format!("127.0.0.1:{}", port))?;
    let source = MySqlSchemaSource::connect(&host, &credentials()).await?;

    let create = source.show_create_view("enwiki_p", "logging").await?;
    let cleaned = clean_view_definition(&create, "enwiki")?;
    let table = table_from_view_sql(&cleaned, "logging")?;

    assert_eq!(table.table_name, "logging");
    let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["log_id", "log_user", "log_comment"]);
    assert!(table.column("log_id").unwrap().whitelisted);
    let log_user = table.column("log_user").unwrap();
    assert!(!log_user.whitelisted);
    assert!(log_user.null_if.as_deref().unwrap().contains("log_deleted"));
    assert!(table.include_row_if.as_deref().unwrap().contains("suppress"));

    source.close().await;
    Ok(())
}

#[tokio::test]
async fn test_mysql_integration_full_run() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    load_fixture(port).await?;

    let config = AuditConfig::from_yaml(&format!(
        "hosts: ['127.0.0.1:{}']\n\
         tableschema-files: [tables.yaml]\n\
         mediawiki-config-path: .\n\
         ignore-db-pattern: '(information_schema|performance_schema|mysql|sys|test)$'\n",
        port
    ))?;
    let tables = BTreeMap::from([
        ("logging".to_string(), logging_model()),
        (
            "user".to_string(),
            Table::new("user").with_column(Column::whitelisted("user_id")),
        ),
    ]);
    let model = Model::new(BTreeSet::from(["enwiki".to_string()]), Some("_p"), tables);

    let runner = ReportRunner::with_default_reports(config, model)?;
    let report = runner.run(&MySqlConnector::new(credentials())).await?;
    assert!(report.is_complete(), "failed hosts: {:?}", report.failed_hosts());

    let host = &report.hosts[0];
    let Some(Report::Databases(databases)) = host.report("databases_report") else {
        panic!("missing databases report");
    };
    assert!(databases.extra_dbs.is_empty(), "{:?}", databases.extra_dbs);
    assert!(databases.missing_private_dbs.is_empty());

    let Some(Report::ViewsSchemaDiff(views)) = host.report("views_schema_diff_report") else {
        panic!("missing views report");
    };
    assert_eq!(
        views.finding("enwiki_p", "user"),
        Some(&ViewFinding::NotAView { not_a_view: true })
    );
    let Some(ViewFinding::Diff(logging)) = views.finding("enwiki_p", "logging") else {
        panic!("expected a diff for logging");
    };
    assert_eq!(
        logging.columns.as_ref().unwrap().extra,
        vec!["log_comment".to_string()]
    );
    assert!(logging.include_row_if.is_some());

    Ok(())
}
