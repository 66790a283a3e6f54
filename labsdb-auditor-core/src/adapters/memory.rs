//! In-memory schema source.
//!
//! Holds databases, tables and view definitions in plain maps and answers
//! metadata queries the way a MySQL host would, including the classified
//! errors for unknown databases and non-view objects.

use super::{Connector, LiveColumn, SchemaSource};
use crate::Result;
use crate::config::HostSpec;
use crate::error::AuditorError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, Default)]
struct MemoryObject {
    columns: Vec<LiveColumn>,
    view_sql: Option<String>,
}

/// Fixture-backed [`SchemaSource`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaSource {
    databases: BTreeMap<String, BTreeMap<String, MemoryObject>>,
    /// Databases that are listed but answer every query with "unknown database"
    vanished: BTreeSet<String>,
    closed: Arc<AtomicBool>,
}

impl InMemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add an empty database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.databases.entry(database.into()).or_default();
        self
    }

    /// Builder method to add a base table.
    pub fn with_table(mut self, database: &str, table: &str, columns: &[&str]) -> Self {
        let object = self.object_mut(database, table);
        object.columns = columns.iter().map(|c| LiveColumn::new(*c, "varbinary(255)")).collect();
        object.view_sql = None;
        self
    }

    /// Builder method to add a view with its raw `SHOW CREATE VIEW` text.
    pub fn with_view(mut self, database: &str, view: &str, create_sql: impl Into<String>) -> Self {
        self.object_mut(database, view).view_sql = Some(create_sql.into());
        self
    }

    /// Builder method to list a database that fails as unknown when queried,
    /// as happens when it is dropped between listing and inspection.
    pub fn with_vanished_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.databases.entry(database.clone()).or_default();
        self.vanished.insert(database);
        self
    }

    /// True once [`SchemaSource::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn object_mut(&mut self, database: &str, name: &str) -> &mut MemoryObject {
        self.databases
            .entry(database.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
    }

    fn database(&self, database: &str) -> Result<&BTreeMap<String, MemoryObject>> {
        if self.vanished.contains(database) {
            return Err(AuditorError::unknown_database(database));
        }
        self.databases
            .get(database)
            .ok_or_else(|| AuditorError::unknown_database(database))
    }

    fn object(&self, database: &str, name: &str) -> Result<&MemoryObject> {
        self.database(database)?.get(name).ok_or_else(|| {
            AuditorError::query_failed(
                format!("Table '{}.{}' doesn't exist", database, name),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such table"),
            )
        })
    }
}

#[async_trait]
impl SchemaSource for InMemorySchemaSource {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.databases.keys().cloned().collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        Ok(self.database(database)?.keys().cloned().collect())
    }

    async fn list_columns(&self, database: &str, table: &str) -> Result<Vec<LiveColumn>> {
        Ok(self.object(database, table)?.columns.clone())
    }

    async fn show_create_view(&self, database: &str, view: &str) -> Result<String> {
        self.object(database, view)?
            .view_sql
            .clone()
            .ok_or_else(|| AuditorError::not_a_view(database, view))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// [`Connector`] handing out clones of prepared in-memory sources.
///
/// Hosts without a registered source fail to connect.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    hosts: BTreeMap<String, InMemorySchemaSource>,
    connects: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register the source served for `host` (as `host:port`).
    pub fn with_host(mut self, host: impl Into<String>, source: InMemorySchemaSource) -> Self {
        self.hosts.insert(host.into(), source);
        self
    }

    /// The source registered for a host; clones share the closed flag.
    pub fn source(&self, host: &str) -> Option<&InMemorySchemaSource> {
        self.hosts.get(host)
    }

    /// Number of successful connections made so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn SchemaSource>> {
        let key = host.to_string();
        let source = self.hosts.get(&key).cloned().ok_or_else(|| {
            AuditorError::connection_failed(
                format!("Failed to connect to {}", key),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )
        })?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(source))
    }
}
