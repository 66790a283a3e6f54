//! Declared model of how a LabsDB host should look.
//!
//! A [`Model`] lists the databases that must exist and the tables (views, on
//! the public side) that may exist in them. Each [`Table`] declares which of
//! its columns pass through unmodified and which are nulled, always or under a
//! SQL condition. The same [`Table`] type is produced by the view parser, so an
//! expected table and a live one can be diffed field by field.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A column that is either whitelisted or (conditionally) nulled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// True when the column is exposed unmodified
    pub whitelisted: bool,
    /// SQL boolean expression under which the column is nulled.
    ///
    /// `None` together with `whitelisted == false` means always nulled.
    pub null_if: Option<String>,
}

impl Column {
    /// Creates a column with an explicit redaction status.
    pub fn new(name: impl Into<String>, whitelisted: bool, null_if: Option<String>) -> Self {
        Self {
            name: name.into(),
            whitelisted,
            null_if,
        }
    }

    /// A column exposed unmodified.
    pub fn whitelisted(name: impl Into<String>) -> Self {
        Self::new(name, true, None)
    }

    /// A column that is always replaced by NULL.
    pub fn nulled(name: impl Into<String>) -> Self {
        Self::new(name, false, None)
    }

    /// A column that is replaced by NULL whenever `condition` holds.
    pub fn null_if(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self::new(name, false, Some(condition.into()))
    }

    /// True when the column is replaced by NULL for every row.
    pub fn is_always_null(&self) -> bool {
        !self.whitelisted && self.null_if.is_none()
    }
}

/// A table (or the view exposing it) and its redaction rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Logical name; the view name on public databases
    pub name: String,
    /// Physical table backing the view, equal to `name` unless renamed
    pub table_name: String,
    /// SQL predicate restricting which rows are exposed
    pub include_row_if: Option<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Creates an empty table whose source table has the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: name.clone(),
            name,
            include_row_if: None,
            columns: Vec::new(),
        }
    }

    /// Builder method to set the physical source table.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Builder method to set the row filter.
    pub fn with_include_row_if(mut self, predicate: impl Into<String>) -> Self {
        self.include_row_if = Some(predicate.into());
        self
    }

    /// Builder method to append a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Adds a column, replacing in place any column with the same name.
    pub fn add_column(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns in insertion order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Sorted set of column names.
    pub fn column_names(&self) -> BTreeSet<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// True when the view exposes its backing table under a different name.
    pub fn is_renamed(&self) -> bool {
        self.table_name != self.name
    }

    /// Builds a table from its schema-file definition.
    pub fn from_def(name: impl Into<String>, def: TableDef) -> Self {
        let mut table = Self::new(name);
        if let Some(table_name) = def.table_name {
            table.table_name = table_name;
        }
        table.include_row_if = def.include_row_if;

        match def.columns {
            ColumnsDef::Whitelisted(names) => {
                for column in names {
                    table.add_column(Column::whitelisted(column));
                }
            }
            ColumnsDef::Explicit(columns) => {
                for (column, column_def) in columns {
                    let null_if = if column_def.whitelisted && column_def.null_if.is_some() {
                        tracing::warn!(
                            "Ignoring null_if on whitelisted column {}.{}",
                            table.name,
                            column
                        );
                        None
                    } else {
                        column_def.null_if
                    };
                    table.add_column(Column::new(column, column_def.whitelisted, null_if));
                }
            }
        }
        table
    }

    /// Converts the table into the minimal schema-file definition it can be
    /// rebuilt from.
    pub fn to_def(&self) -> TableDef {
        let columns = if self.columns.iter().all(|c| c.whitelisted) {
            ColumnsDef::Whitelisted(self.columns.iter().map(|c| c.name.clone()).collect())
        } else {
            ColumnsDef::Explicit(
                self.columns
                    .iter()
                    .map(|c| {
                        (
                            c.name.clone(),
                            ColumnDef {
                                whitelisted: c.whitelisted,
                                null_if: c.null_if.clone(),
                            },
                        )
                    })
                    .collect(),
            )
        };

        TableDef {
            table_name: self.is_renamed().then(|| self.table_name.clone()),
            include_row_if: self.include_row_if.clone(),
            columns,
        }
    }
}

/// Schema-file representation of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_row_if: Option<String>,
    pub columns: ColumnsDef,
}

/// The two accepted shapes of a table's `columns` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnsDef {
    /// Plain list: every column is whitelisted
    Whitelisted(Vec<String>),
    /// Mapping: every column states its redaction status
    Explicit(BTreeMap<String, ColumnDef>),
}

/// Explicit redaction status of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    pub whitelisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_if: Option<String>,
}

/// Complete model of how a LabsDB host should be.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Fully replicated per-wiki databases
    pub private_dbs: BTreeSet<String>,
    /// Publicly readable counterparts, empty when public auditing is off
    pub public_dbs: BTreeSet<String>,
    /// Tables that may exist in any database, keyed by name
    pub tables: BTreeMap<String, Table>,
}

impl Model {
    /// Creates a model, deriving the public databases by appending
    /// `public_suffix` to every private database name.
    pub fn new(
        private_dbs: BTreeSet<String>,
        public_suffix: Option<&str>,
        tables: BTreeMap<String, Table>,
    ) -> Self {
        let public_dbs = match public_suffix {
            Some(suffix) => private_dbs
                .iter()
                .map(|db| format!("{}{}", db, suffix))
                .collect(),
            None => BTreeSet::new(),
        };
        Self {
            private_dbs,
            public_dbs,
            tables,
        }
    }

    /// True when `name` is a declared private or public database.
    pub fn knows_database(&self, name: &str) -> bool {
        self.private_dbs.contains(name) || self.public_dbs.contains(name)
    }

    /// Looks up the expected definition of a table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// True when `name` is a declared table.
    pub fn expects_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging_table() -> Table {
        Table::new("logging")
            .with_include_row_if("log_deleted = 0")
            .with_column(Column::whitelisted("log_id"))
            .with_column(Column::null_if("log_user", "log_deleted & 4"))
            .with_column(Column::nulled("log_params"))
    }

    #[test]
    fn test_table_defaults_table_name_to_name() {
        let table = Table::new("revision");
        assert_eq!(table.table_name, "revision");
        assert!(!table.is_renamed());

        let table = Table::new("revision_userindex").with_table_name("revision");
        assert!(table.is_renamed());
    }

    #[test]
    fn test_add_column_replaces_same_name_in_place() {
        let mut table = Table::new("user")
            .with_column(Column::whitelisted("user_id"))
            .with_column(Column::whitelisted("user_name"));
        table.add_column(Column::nulled("user_id"));

        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.columns()[0].name, "user_id");
        assert!(table.columns()[0].is_always_null());
    }

    #[test]
    fn test_tables_do_not_share_columns() {
        let mut first = Table::new("a");
        let second = Table::new("b");
        first.add_column(Column::whitelisted("x"));

        assert_eq!(first.columns().len(), 1);
        assert!(second.columns().is_empty());
    }

    #[test]
    fn test_whitelisted_table_def_uses_list_form() {
        let table = Table::new("page")
            .with_column(Column::whitelisted("page_id"))
            .with_column(Column::whitelisted("page_title"));

        let def = table.to_def();
        assert_eq!(
            def.columns,
            ColumnsDef::Whitelisted(vec!["page_id".to_string(), "page_title".to_string()])
        );
        assert!(def.table_name.is_none());
        assert!(def.include_row_if.is_none());
    }

    #[test]
    fn test_table_def_round_trip() {
        let table = logging_table();
        let def = table.to_def();
        assert!(matches!(def.columns, ColumnsDef::Explicit(_)));

        let rebuilt = Table::from_def("logging", def);
        assert_eq!(rebuilt.include_row_if, table.include_row_if);
        assert_eq!(rebuilt.column_names(), table.column_names());
        for column in table.columns() {
            assert_eq!(rebuilt.column(&column.name), Some(column));
        }
    }

    #[test]
    fn test_renamed_table_def_keeps_table_name() {
        let table = Table::new("logging_logindex")
            .with_table_name("logging")
            .with_column(Column::whitelisted("log_id"));
        let def = table.to_def();
        assert_eq!(def.table_name.as_deref(), Some("logging"));
    }

    #[test]
    fn test_from_def_drops_null_if_on_whitelisted_column() {
        let def: TableDef = serde_yaml::from_str(
            "columns:\n  user_id: {whitelisted: true, null_if: \"1=1\"}\n",
        )
        .unwrap();
        let table = Table::from_def("user", def);
        assert_eq!(table.column("user_id"), Some(&Column::whitelisted("user_id")));
    }

    #[test]
    fn test_explicit_columns_require_whitelisted() {
        let result: Result<TableDef, _> =
            serde_yaml::from_str("columns:\n  user_id: {null_if: \"1=1\"}\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_model_derives_public_dbs() {
        let private = BTreeSet::from(["enwiki".to_string(), "dewiki".to_string()]);
        let model = Model::new(private.clone(), Some("_p"), BTreeMap::new());
        assert_eq!(
            model.public_dbs,
            BTreeSet::from(["enwiki_p".to_string(), "dewiki_p".to_string()])
        );
        assert!(model.knows_database("enwiki"));
        assert!(model.knows_database("dewiki_p"));
        assert!(!model.knows_database("frwiki"));

        let model = Model::new(private, None, BTreeMap::new());
        assert!(model.public_dbs.is_empty());
    }
}
