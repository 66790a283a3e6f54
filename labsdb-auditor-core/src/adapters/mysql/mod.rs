//! MySQL/MariaDB schema source.
//!
//! # Module Structure
//! - `connection`: credentials, connection URL and single-connection pool
//!
//! # Security Guarantees
//! - Only `SHOW` and `DESCRIBE` statements are issued
//! - Sessions are switched to read-only transactions on connect
//! - The password never appears in logs or errors

pub mod connection;


use super::{Connector, LiveColumn, SchemaSource, quote_identifier};
use crate::Result;
use crate::config::HostSpec;
use crate::error::AuditorError;
use async_trait::async_trait;
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{Executor, MySqlPool, Row};

pub use connection::{DEFAULT_MYSQL_USER, MySqlCredentials, connection_url};

/// MySQL error number for `ER_BAD_DB_ERROR`.
pub const ER_BAD_DB_ERROR: u16 = 1049;
/// MySQL error number for `ER_WRONG_OBJECT` ("is not VIEW").
pub const ER_WRONG_OBJECT: u16 = 1347;

/// Schema source backed by a live MySQL connection.
pub struct MySqlSchemaSource {
    pool: MySqlPool,
    host: String,
}

impl std::fmt::Debug for MySqlSchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSchemaSource")
            .field("host", &self.host)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

/// Maps a MySQL error number onto a named error kind.
///
/// Returns `None` for numbers without a classification.
pub fn classify_error_number(
    number: u16,
    database: &str,
    object: Option<&str>,
) -> Option<AuditorError> {
    match (number, object) {
        (ER_BAD_DB_ERROR, _) => Some(AuditorError::unknown_database(database)),
        (ER_WRONG_OBJECT, Some(object)) => Some(AuditorError::not_a_view(database, object)),
        _ => None,
    }
}

fn classify_error(
    error: sqlx::Error,
    context: String,
    database: &str,
    object: Option<&str>,
) -> AuditorError {
    if let sqlx::Error::Database(db_error) = &error
        && let Some(mysql_error) = db_error.try_downcast_ref::<MySqlDatabaseError>()
        && let Some(classified) = classify_error_number(mysql_error.number(), database, object)
    {
        return classified;
    }
    AuditorError::query_failed(context, error)
}

/// Reads a text column, accepting binary-collated results.
fn text_at(row: &MySqlRow, index: usize) -> Result<String> {
    match row.try_get::<String, _>(index) {
        Ok(value) => Ok(value),
        Err(_) => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|e| AuditorError::query_failed(format!("Failed to decode column {}", index), e)),
    }
}

impl MySqlSchemaSource {
    async fn fetch(&self, sql: &str, database: &str, object: Option<&str>) -> Result<Vec<MySqlRow>> {
        tracing::trace!("{}: {}", self.host, sql);
        // Plain text protocol: SHOW and DESCRIBE are not preparable everywhere
        self.pool
            .fetch_all(sql)
            .await
            .map_err(|e| classify_error(e, format!("{} on {}", sql, self.host), database, object))
    }
}

#[async_trait]
impl SchemaSource for MySqlSchemaSource {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.fetch("SHOW DATABASES", "", None)
            .await?
            .iter()
            .map(|row| text_at(row, 0))
            .collect()
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let sql = format!("SHOW TABLES FROM {}", quote_identifier(database));
        self.fetch(&sql, database, None)
            .await?
            .iter()
            .map(|row| text_at(row, 0))
            .collect()
    }

    async fn list_columns(&self, database: &str, table: &str) -> Result<Vec<LiveColumn>> {
        let sql = format!(
            "DESCRIBE {}.{}",
            quote_identifier(database),
            quote_identifier(table)
        );
        self.fetch(&sql, database, None)
            .await?
            .iter()
            .map(|row| Ok(LiveColumn::new(text_at(row, 0)?, text_at(row, 1)?)))
            .collect()
    }

    async fn show_create_view(&self, database: &str, view: &str) -> Result<String> {
        let sql = format!(
            "SHOW CREATE VIEW {}.{}",
            quote_identifier(database),
            quote_identifier(view)
        );
        let rows = self.fetch(&sql, database, Some(view)).await?;
        let row = rows.first().ok_or_else(|| {
            AuditorError::query_failed(
                format!("{} returned no rows", sql),
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty result"),
            )
        })?;
        // Columns: View, Create View, character_set_client, collation_connection
        text_at(row, 1)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Closed connection to {}", self.host);
    }
}

/// [`Connector`] opening [`MySqlSchemaSource`]s with shared credentials.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    credentials: MySqlCredentials,
}

impl MySqlConnector {
    pub fn new(credentials: MySqlCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn SchemaSource>> {
        let source = MySqlSchemaSource::connect(host, &self.credentials).await?;
        Ok(Box::new(source))
    }
}
