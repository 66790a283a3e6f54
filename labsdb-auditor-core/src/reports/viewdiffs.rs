//! Structural diff of the public redaction views against the model.
//!
//! For every view that exists both on the host and in the model, the live
//! `SHOW CREATE VIEW` text is cleaned, parsed back into a [`Table`] and diffed
//! against the declared one. Views that cannot be parsed, and objects that
//! turn out to be base tables, are reported as findings instead of failing
//! the report.
//!
//! [`Table`]: crate::models::Table

use super::{Report, ReportContext, ReportGenerator};
use crate::Result;
use crate::adapters::SchemaSource;
use crate::diff::{TableDiff, diff_tables};
use crate::error::AuditorError;
use crate::models::Table;
use crate::viewdef::{clean_view_definition, table_from_view_sql};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// A view whose definition does not follow the redaction view grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnparseableView {
    pub error: String,
    /// The text handed to the parser, or the raw definition when cleaning failed
    pub sql: String,
}

/// Outcome for one view that differs from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ViewFinding {
    Diff(TableDiff),
    Unparseable { unparseable: UnparseableView },
    NotAView { not_a_view: bool },
}

/// Findings of one host as `database -> view -> finding`.
///
/// Databases without findings are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ViewsSchemaDiffReport(pub BTreeMap<String, BTreeMap<String, ViewFinding>>);

impl ViewsSchemaDiffReport {
    /// True when every inspected view matches the model.
    pub fn is_clean(&self) -> bool {
        self.0.is_empty()
    }

    /// The finding for one view, if any.
    pub fn finding(&self, database: &str, view: &str) -> Option<&ViewFinding> {
        self.0.get(database).and_then(|views| views.get(view))
    }
}

/// Checks a live view definition against its declared table.
///
/// `source_db` is the private database the view reads from.
pub fn check_view(create_sql: &str, source_db: &str, expected: &Table) -> Option<ViewFinding> {
    let cleaned = match clean_view_definition(create_sql, source_db) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            return Some(ViewFinding::Unparseable {
                unparseable: UnparseableView {
                    error: e.to_string(),
                    sql: create_sql.to_string(),
                },
            });
        }
    };

    match table_from_view_sql(&cleaned, &expected.name) {
        Ok(actual) => diff_tables(expected, &actual).map(ViewFinding::Diff),
        Err(e) => Some(ViewFinding::Unparseable {
            unparseable: UnparseableView {
                error: e.to_string(),
                sql: cleaned,
            },
        }),
    }
}

/// Diffs every modelled view of every public database.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewsSchemaDiffReportGenerator;

impl ViewsSchemaDiffReportGenerator {
    async fn check_database(
        ctx: &ReportContext<'_>,
        source: &dyn SchemaSource,
        public_db: &str,
    ) -> Result<BTreeMap<String, ViewFinding>> {
        let source_db = ctx.config.source_db_name(public_db);
        let mut findings = BTreeMap::new();

        let live_views = source.list_tables(public_db).await?;
        for view in live_views {
            let Some(expected) = ctx.model.table(&view) else {
                continue;
            };

            let create_sql = match source.show_create_view(public_db, &view).await {
                Ok(sql) => sql,
                Err(AuditorError::NotAView { .. }) => {
                    tracing::warn!("{}.{} is a table, not a view", public_db, view);
                    findings.insert(view, ViewFinding::NotAView { not_a_view: true });
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(finding) = check_view(&create_sql, source_db, expected) {
                tracing::debug!("{}.{} differs from the model", public_db, view);
                findings.insert(view, finding);
            }
        }

        Ok(findings)
    }
}

#[async_trait]
impl ReportGenerator for ViewsSchemaDiffReportGenerator {
    fn name(&self) -> &'static str {
        "views_schema_diff_report"
    }

    fn description(&self) -> &'static str {
        "Differences between public view definitions and the declared redaction model"
    }

    async fn generate(&self, ctx: &ReportContext<'_>, source: &dyn SchemaSource) -> Result<Report> {
        let mut report = ViewsSchemaDiffReport::default();

        for public_db in &ctx.model.public_dbs {
            if ctx.filters.is_ignored(public_db) {
                continue;
            }
            match Self::check_database(ctx, source, public_db).await {
                Ok(findings) if findings.is_empty() => {}
                Ok(findings) => {
                    tracing::info!("{}: {} views differ from the model", public_db, findings.len());
                    report.0.insert(public_db.clone(), findings);
                }
                Err(e) if e.is_unknown_database() => {
                    tracing::warn!("Skipping {}: {}", public_db, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Report::ViewsSchemaDiff(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use crate::viewdef::render_create_view;

    fn page_table() -> Table {
        Table::new("page")
            .with_column(Column::whitelisted("page_id"))
            .with_column(Column::whitelisted("page_title"))
    }

    #[test]
    fn test_matching_view_has_no_finding() {
        let sql = render_create_view(&page_table(), "enwiki");
        assert!(check_view(&sql, "enwiki", &page_table()).is_none());
    }

    #[test]
    fn test_unqualified_source_db_is_unparseable() {
        let sql = render_create_view(&page_table(), "enwiki");
        let finding = check_view(&sql, "dewiki", &page_table()).unwrap();
        let ViewFinding::Unparseable { unparseable } = finding else {
            panic!("expected unparseable finding");
        };
        assert!(unparseable.sql.contains("enwiki.page.page_id"));
        assert!(unparseable.error.contains("'as'"));
    }

    #[test]
    fn test_view_over_other_table_reports_table_name() {
        let live = page_table().with_table_name("page_old");
        let sql = render_create_view(&live, "enwiki");
        let finding = check_view(&sql, "enwiki", &page_table()).unwrap();
        assert_eq!(
            serde_json::to_value(finding).unwrap(),
            serde_json::json!({"table_name": {"expected": "page", "found": "page_old"}})
        );
    }

    #[test]
    fn test_missing_body_keeps_raw_sql() {
        let raw = "CREATE TABLE `page` (`page_id` int)";
        let finding = check_view(raw, "enwiki", &page_table()).unwrap();
        assert_eq!(
            finding,
            ViewFinding::Unparseable {
                unparseable: UnparseableView {
                    error: "no SELECT body found in view definition".to_string(),
                    sql: raw.to_string(),
                }
            }
        );
    }

    #[test]
    fn test_finding_serialization() {
        let value = serde_json::to_value(ViewFinding::NotAView { not_a_view: true }).unwrap();
        assert_eq!(value, serde_json::json!({"not_a_view": true}));

        let live = page_table().with_column(Column::whitelisted("page_touched"));
        let sql = render_create_view(&live, "enwiki");
        let finding = check_view(&sql, "enwiki", &page_table()).unwrap();
        assert_eq!(
            serde_json::to_value(finding).unwrap(),
            serde_json::json!({"columns": {"extra": ["page_touched"]}})
        );
    }
}
