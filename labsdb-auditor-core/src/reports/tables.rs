//! Tables present on a host that the model does not declare.

use super::{Report, ReportContext, ReportGenerator};
use crate::Result;
use crate::adapters::SchemaSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Extra tables of one host, as `table -> [databases…]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtraTablesReport {
    pub extra_tables_public_dbs: BTreeMap<String, Vec<String>>,
    pub extra_tables_private_dbs: BTreeMap<String, Vec<String>>,
    /// Modelled databases that do not exist on the host
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_dbs: Vec<String>,
}

/// Lists each modelled database's tables and records undeclared ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraTablesReportGenerator;

impl ExtraTablesReportGenerator {
    async fn collect(
        ctx: &ReportContext<'_>,
        source: &dyn SchemaSource,
        databases: &BTreeSet<String>,
        skipped: &mut Vec<String>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut extra: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for db in databases {
            if ctx.filters.is_ignored(db) {
                continue;
            }
            let tables = match source.list_tables(db).await {
                Ok(tables) => tables,
                Err(e) if e.is_unknown_database() => {
                    tracing::warn!("Skipping {}: {}", db, e);
                    skipped.push(db.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };

            for table in tables {
                if !ctx.model.expects_table(&table) {
                    extra.entry(table).or_default().push(db.clone());
                }
            }
        }

        Ok(extra)
    }
}

#[async_trait]
impl ReportGenerator for ExtraTablesReportGenerator {
    fn name(&self) -> &'static str {
        "extra_tables_report"
    }

    fn description(&self) -> &'static str {
        "Tables in modelled databases that are not part of the model"
    }

    async fn generate(&self, ctx: &ReportContext<'_>, source: &dyn SchemaSource) -> Result<Report> {
        let mut skipped_dbs = Vec::new();
        let extra_tables_public_dbs =
            Self::collect(ctx, source, &ctx.model.public_dbs, &mut skipped_dbs).await?;
        let extra_tables_private_dbs =
            Self::collect(ctx, source, &ctx.model.private_dbs, &mut skipped_dbs).await?;
        skipped_dbs.sort();

        tracing::debug!(
            "Extra tables: {} public, {} private, {} databases skipped",
            extra_tables_public_dbs.len(),
            extra_tables_private_dbs.len(),
            skipped_dbs.len()
        );

        Ok(Report::ExtraTables(ExtraTablesReport {
            extra_tables_public_dbs,
            extra_tables_private_dbs,
            skipped_dbs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySchemaSource;
    use crate::config::{AuditConfig, DatabaseFilters};
    use crate::models::{Column, Model, Table};

    fn model() -> Model {
        let private = BTreeSet::from(["enwiki".to_string(), "dewiki".to_string()]);
        let tables = BTreeMap::from([(
            "page".to_string(),
            Table::new("page").with_column(Column::whitelisted("page_id")),
        )]);
        Model::new(private, Some("_p"), tables)
    }

    #[tokio::test]
    async fn test_groups_extra_tables_by_table() {
        let config =
            AuditConfig::from_yaml("hosts: [db1]\ntableschema-files: [t.yaml]\nmediawiki-config-path: .\n")
                .unwrap();
        let filters = DatabaseFilters::default();
        let model = model();
        let ctx = ReportContext {
            config: &config,
            filters: &filters,
            model: &model,
        };
        let source = InMemorySchemaSource::new()
            .with_table("enwiki", "page", &["page_id"])
            .with_table("enwiki", "secret", &["s"])
            .with_table("dewiki", "secret", &["s"])
            .with_view("enwiki_p", "page", "")
            .with_view("enwiki_p", "leak", "")
            .with_database("dewiki_p");

        let Report::ExtraTables(report) = ExtraTablesReportGenerator
            .generate(&ctx, &source)
            .await
            .unwrap()
        else {
            panic!("unexpected report type");
        };

        assert_eq!(
            report.extra_tables_private_dbs,
            BTreeMap::from([(
                "secret".to_string(),
                vec!["dewiki".to_string(), "enwiki".to_string()]
            )])
        );
        assert_eq!(
            report.extra_tables_public_dbs,
            BTreeMap::from([("leak".to_string(), vec!["enwiki_p".to_string()])])
        );
        assert!(report.skipped_dbs.is_empty());
    }
}
