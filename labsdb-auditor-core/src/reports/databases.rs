//! Databases present on a host but not modelled, and the reverse.

use super::{Report, ReportContext, ReportGenerator};
use crate::Result;
use crate::adapters::SchemaSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

/// Database-level discrepancies of one host. All lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabasesReport {
    pub extra_dbs: Vec<String>,
    pub missing_private_dbs: Vec<String>,
    pub missing_public_dbs: Vec<String>,
}

/// Compares live database names against the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabasesReportGenerator;

impl DatabasesReportGenerator {
    /// Builds the report from a list of live database names.
    pub fn compare(ctx: &ReportContext<'_>, live: &[String]) -> DatabasesReport {
        let live: BTreeSet<&str> = live.iter().map(String::as_str).collect();
        let model = ctx.model;
        let filters = ctx.filters;

        let extra_dbs = live
            .iter()
            .filter(|db| !model.knows_database(db))
            .filter(|db| !filters.is_ignored(db) && !filters.is_user_db(db))
            .map(|db| db.to_string())
            .collect();

        let missing = |expected: &BTreeSet<String>| -> Vec<String> {
            expected
                .iter()
                .filter(|db| !live.contains(db.as_str()) && !filters.is_ignored(db))
                .cloned()
                .collect()
        };

        DatabasesReport {
            extra_dbs,
            missing_private_dbs: missing(&model.private_dbs),
            missing_public_dbs: missing(&model.public_dbs),
        }
    }
}

#[async_trait]
impl ReportGenerator for DatabasesReportGenerator {
    fn name(&self) -> &'static str {
        "databases_report"
    }

    fn description(&self) -> &'static str {
        "Databases on the host that are not modelled, and modelled databases that are missing"
    }

    async fn generate(&self, ctx: &ReportContext<'_>, source: &dyn SchemaSource) -> Result<Report> {
        let live = source.list_databases().await?;
        tracing::debug!("Host lists {} databases", live.len());

        let report = Self::compare(ctx, &live);
        if !report.extra_dbs.is_empty() {
            tracing::info!("Found {} extra databases", report.extra_dbs.len());
        }
        Ok(Report::Databases(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, DatabaseFilters};
    use crate::models::Model;
    use std::collections::BTreeMap;

    fn config() -> AuditConfig {
        AuditConfig::from_yaml("hosts: [db1]\ntableschema-files: [t.yaml]\nmediawiki-config-path: .\n")
            .unwrap()
    }

    fn model() -> Model {
        let private = BTreeSet::from(["enwiki".to_string(), "testwiki".to_string()]);
        Model::new(private, Some("_p"), BTreeMap::new())
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_extra_and_missing() {
        let config = config();
        let filters = DatabaseFilters::default();
        let model = model();
        let ctx = ReportContext {
            config: &config,
            filters: &filters,
            model: &model,
        };

        let report = DatabasesReportGenerator::compare(
            &ctx,
            &names(&["zzz", "enwiki", "enwiki_p", "testwiki", "aaa"]),
        );
        assert_eq!(report.extra_dbs, names(&["aaa", "zzz"]));
        assert!(report.missing_private_dbs.is_empty());
        assert_eq!(report.missing_public_dbs, names(&["testwiki_p"]));
    }

    #[test]
    fn test_ignored_and_user_databases() {
        let config = config();
        let filters =
            DatabaseFilters::compile(Some("test|information_schema"), Some("[su][0-9]+__")).unwrap();
        let model = model();
        let ctx = ReportContext {
            config: &config,
            filters: &filters,
            model: &model,
        };

        let report = DatabasesReportGenerator::compare(
            &ctx,
            &names(&["enwiki", "enwiki_p", "information_schema", "s51234__tools", "u42__x"]),
        );
        assert!(report.extra_dbs.is_empty());
        // testwiki and testwiki_p are ignored even though they are modelled
        assert!(report.missing_private_dbs.is_empty());
        assert!(report.missing_public_dbs.is_empty());
    }

    #[test]
    fn test_serialized_keys() {
        let report = DatabasesReport {
            extra_dbs: names(&["junk"]),
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "extra_dbs": ["junk"],
                "missing_private_dbs": [],
                "missing_public_dbs": []
            })
        );
    }
}
