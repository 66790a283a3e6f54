//! Schema sources: read-only access to the live metadata of one host.
//!
//! Report generators only ever see a `&dyn SchemaSource`, so they cannot
//! outlive the connection the runner opened for the host. Driver errors that
//! reports must react to are classified into named [`AuditorError`] variants by
//! the implementations here.
//!
//! # Module Structure
//! - `memory`: fixture-backed source for tests and dry runs
//! - `mysql`: sqlx-based MySQL/MariaDB source (feature `mysql`)
//!
//! [`AuditorError`]: crate::error::AuditorError

use crate::Result;
use crate::config::HostSpec;
use async_trait::async_trait;

pub mod memory;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use memory::{InMemoryConnector, InMemorySchemaSource};

/// Live column as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub column_type: String,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Read-only metadata access for one host.
///
/// # Object Safety
/// This trait is object-safe and is used through `&dyn SchemaSource`.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Lists every database on the host.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Lists tables and views of a database.
    ///
    /// # Errors
    /// Returns [`AuditorError::UnknownDatabase`](crate::error::AuditorError::UnknownDatabase)
    /// when the database does not exist.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Lists the columns of a table or view in definition order.
    async fn list_columns(&self, database: &str, table: &str) -> Result<Vec<LiveColumn>>;

    /// Returns the raw `SHOW CREATE VIEW` text of a view.
    ///
    /// # Errors
    /// Returns [`AuditorError::NotAView`](crate::error::AuditorError::NotAView)
    /// when the object is a base table.
    async fn show_create_view(&self, database: &str, view: &str) -> Result<String>;

    /// Releases the underlying connection. Further calls may fail.
    async fn close(&self);
}

/// Opens a [`SchemaSource`] for a host.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `host`.
    ///
    /// # Errors
    /// Returns [`AuditorError::Connection`](crate::error::AuditorError::Connection)
    /// when the host cannot be reached.
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn SchemaSource>>;
}

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
///
/// ```rust
/// use labsdb_auditor_core::adapters::quote_identifier;
///
/// assert_eq!(quote_identifier("enwiki_p"), "`enwiki_p`");
/// assert_eq!(quote_identifier("we`ird"), "`we``ird`");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
