//! Structural comparison of an expected table against a live one.
//!
//! Only discrepancies are kept: a field that matches is absent from the
//! resulting [`TableDiff`], and a table that matches entirely yields `None`.

use crate::models::{Column, Table};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single field that differs between the model and the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff<T> {
    pub expected: T,
    pub found: T,
}

impl<T: PartialEq> FieldDiff<T> {
    /// Returns a diff when `expected` and `found` differ.
    pub fn between(expected: T, found: T) -> Option<Self> {
        (expected != found).then_some(Self { expected, found })
    }
}

/// Differences of one column present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<FieldDiff<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelisted: Option<FieldDiff<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_if: Option<FieldDiff<Option<String>>>,
}

impl ColumnDiff {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.whitelisted.is_none() && self.null_if.is_none()
    }
}

/// Column-level differences of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnsDiff {
    /// Declared columns the live view does not expose
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Live columns the model does not declare
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
    /// Shared columns whose redaction differs, keyed by column name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub diff: BTreeMap<String, ColumnDiff>,
}

impl ColumnsDiff {
    fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.diff.is_empty()
    }
}

/// All differences between an expected and a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<FieldDiff<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_row_if: Option<FieldDiff<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnsDiff>,
}

impl TableDiff {
    /// True when no discrepancy was recorded.
    pub fn is_empty(&self) -> bool {
        self.table_name.is_none() && self.include_row_if.is_none() && self.columns.is_none()
    }
}

/// Compares two columns of the same name.
pub fn diff_columns(expected: &Column, actual: &Column) -> Option<ColumnDiff> {
    let diff = ColumnDiff {
        name: FieldDiff::between(expected.name.clone(), actual.name.clone()),
        whitelisted: FieldDiff::between(expected.whitelisted, actual.whitelisted),
        null_if: FieldDiff::between(expected.null_if.clone(), actual.null_if.clone()),
    };
    (!diff.is_empty()).then_some(diff)
}

/// Compares an expected table against the table parsed from a live view.
///
/// # Example
/// ```rust
/// use labsdb_auditor_core::diff::diff_tables;
/// use labsdb_auditor_core::models::{Column, Table};
///
/// let expected = Table::new("user").with_column(Column::whitelisted("user_id"));
/// assert!(diff_tables(&expected, &expected.clone()).is_none());
///
/// let actual = expected.clone().with_column(Column::whitelisted("user_email"));
/// let diff = diff_tables(&expected, &actual).unwrap();
/// assert_eq!(diff.columns.unwrap().extra, vec!["user_email".to_string()]);
/// ```
pub fn diff_tables(expected: &Table, actual: &Table) -> Option<TableDiff> {
    let expected_names = expected.column_names();
    let actual_names = actual.column_names();

    let mut columns = ColumnsDiff {
        missing: expected_names
            .difference(&actual_names)
            .map(|name| name.to_string())
            .collect(),
        extra: actual_names
            .difference(&expected_names)
            .map(|name| name.to_string())
            .collect(),
        diff: BTreeMap::new(),
    };

    for name in expected_names.intersection(&actual_names) {
        if let (Some(exp), Some(act)) = (expected.column(name), actual.column(name))
            && let Some(diff) = diff_columns(exp, act)
        {
            columns.diff.insert(name.to_string(), diff);
        }
    }

    let diff = TableDiff {
        table_name: FieldDiff::between(expected.table_name.clone(), actual.table_name.clone()),
        include_row_if: FieldDiff::between(
            expected.include_row_if.clone(),
            actual.include_row_if.clone(),
        ),
        columns: (!columns.is_empty()).then_some(columns),
    };

    (!diff.is_empty()).then_some(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_table() -> Table {
        Table::new("user")
            .with_column(Column::whitelisted("user_id"))
            .with_column(Column::whitelisted("user_name"))
            .with_column(Column::nulled("user_password"))
    }

    #[test]
    fn test_identical_tables_have_no_diff() {
        assert!(diff_tables(&user_table(), &user_table()).is_none());
    }

    #[test]
    fn test_missing_and_extra_columns_are_sorted() {
        let expected = user_table().with_column(Column::whitelisted("user_touched"));
        let actual = user_table()
            .with_column(Column::whitelisted("user_token"))
            .with_column(Column::whitelisted("user_email"));

        let diff = diff_tables(&expected, &actual).unwrap();
        let columns = diff.columns.unwrap();
        assert_eq!(columns.missing, vec!["user_touched".to_string()]);
        assert_eq!(
            columns.extra,
            vec!["user_email".to_string(), "user_token".to_string()]
        );
        assert!(columns.diff.is_empty());
        assert!(diff.table_name.is_none());
    }

    #[test]
    fn test_redaction_change_is_reported_per_column() {
        let expected = user_table();
        let mut actual = user_table();
        actual.add_column(Column::whitelisted("user_password"));
        actual.add_column(Column::null_if("user_name", "user_hidden = 1"));

        let diff = diff_tables(&expected, &actual).unwrap();
        let columns = diff.columns.unwrap();
        assert_eq!(columns.diff.len(), 2);
        assert_eq!(
            columns.diff["user_password"].whitelisted,
            Some(FieldDiff {
                expected: false,
                found: true
            })
        );
        assert!(columns.diff["user_password"].null_if.is_none());

        let name_diff = &columns.diff["user_name"];
        assert!(name_diff.whitelisted.is_some());
        assert_eq!(
            name_diff.null_if,
            Some(FieldDiff {
                expected: None,
                found: Some("user_hidden = 1".to_string())
            })
        );
    }

    #[test]
    fn test_table_fields() {
        let expected = user_table().with_include_row_if("user_id > 0");
        let actual = user_table().with_table_name("user_old");

        let diff = diff_tables(&expected, &actual).unwrap();
        assert_eq!(
            diff.table_name,
            Some(FieldDiff {
                expected: "user".to_string(),
                found: "user_old".to_string()
            })
        );
        assert_eq!(
            diff.include_row_if,
            Some(FieldDiff {
                expected: Some("user_id > 0".to_string()),
                found: None
            })
        );
        assert!(diff.columns.is_none());
    }

    #[test]
    fn test_serialization_omits_empty_parts() {
        let expected = Table::new("page").with_column(Column::whitelisted("page_id"));
        let actual = Table::new("page")
            .with_include_row_if("page_namespace = 0")
            .with_column(Column::whitelisted("page_id"));

        let diff = diff_tables(&expected, &actual).unwrap();
        let value = serde_json::to_value(&diff).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "include_row_if": {"expected": null, "found": "page_namespace = 0"}
            })
        );
    }
}
