//! Report generators.
//!
//! Each generator inspects one host through a [`SchemaSource`] and compares it
//! against the declared [`Model`]. Generators are independent of each other
//! and run in registration order.
//!
//! # Module Structure
//! - `databases`: extra and missing databases
//! - `tables`: tables present on the host but absent from the model
//! - `viewdiffs`: structural diff of public view definitions

use crate::Result;
use crate::adapters::SchemaSource;
use crate::config::{AuditConfig, DatabaseFilters};
use crate::models::Model;
use async_trait::async_trait;
use serde::Serialize;

pub mod databases;
pub mod tables;
pub mod viewdiffs;

pub use databases::{DatabasesReport, DatabasesReportGenerator};
pub use tables::{ExtraTablesReport, ExtraTablesReportGenerator};
pub use viewdiffs::{ViewFinding, ViewsSchemaDiffReport, ViewsSchemaDiffReportGenerator};

/// Everything a generator needs besides the host itself.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub config: &'a AuditConfig,
    pub filters: &'a DatabaseFilters,
    pub model: &'a Model,
}

/// Result of one generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Databases(DatabasesReport),
    ExtraTables(ExtraTablesReport),
    ViewsSchemaDiff(ViewsSchemaDiffReport),
}

/// A report tagged with the generator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedReport {
    pub name: String,
    pub report: Report,
}

/// A report generator.
///
/// # Object Safety
/// This trait is object-safe so the runner can hold `Box<dyn ReportGenerator>`.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Stable name used as the report key in the output.
    fn name(&self) -> &'static str;

    /// One-line human readable description.
    fn description(&self) -> &'static str;

    /// Inspects the host behind `source`.
    ///
    /// # Errors
    /// Returns an error only for failures that invalidate the whole report;
    /// per-database and per-view problems are recorded in the report.
    async fn generate(&self, ctx: &ReportContext<'_>, source: &dyn SchemaSource) -> Result<Report>;
}

/// The standard generators in their usual order.
pub fn default_generators() -> Vec<Box<dyn ReportGenerator>> {
    vec![
        Box::new(DatabasesReportGenerator),
        Box::new(ExtraTablesReportGenerator),
        Box::new(ViewsSchemaDiffReportGenerator),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generator_names_are_unique() {
        let generators = default_generators();
        let names: Vec<&str> = generators.iter().map(|g| g.name()).collect();
        assert_eq!(
            names,
            vec![
                "databases_report",
                "extra_tables_report",
                "views_schema_diff_report"
            ]
        );
        assert!(generators.iter().all(|g| !g.description().is_empty()));
    }
}
