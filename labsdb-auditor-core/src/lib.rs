//! Core library of the LabsDB auditor.
//!
//! The auditor checks that replicated MySQL hosts match a declared model: the
//! databases that must exist, the tables they may hold and how every public
//! view redacts its columns and rows. Live metadata is read through a
//! [`SchemaSource`], compared by the [`reports`] generators and gathered into an
//! [`AuditReport`] by the [`ReportRunner`].
//!
//! # Guarantees
//! - Only metadata statements are issued, on read-only sessions
//! - One connection per host, closed before the next host is contacted
//! - Passwords are never logged or serialized
//!
//! # Architecture
//! - `models` and `config` describe what a host should look like
//! - `viewdef` turns live view SQL back into a model table
//! - `diff` compares two tables
//! - `reports` and `runner` drive the comparison per host

pub mod adapters;
pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod models;
pub mod reports;
pub mod runner;
pub mod viewdef;

// Re-export commonly used types
pub use adapters::{Connector, InMemoryConnector, InMemorySchemaSource, LiveColumn, SchemaSource};
pub use config::{AuditConfig, DatabaseFilters, HostSpec};
pub use diff::{TableDiff, diff_tables};
pub use error::{AuditorError, Result};
pub use models::{Column, Model, Table, TableDef};
pub use reports::{Report, ReportContext, ReportGenerator};
pub use runner::{AuditReport, HostReport, ReportRunner};
pub use viewdef::{ViewParseError, table_from_view_sql};

#[cfg(feature = "mysql")]
pub use adapters::mysql::{MySqlConnector, MySqlCredentials, MySqlSchemaSource};
