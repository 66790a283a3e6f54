//! Property tests for the view SQL parser and renderer.

#![allow(clippy::unwrap_used)]

use labsdb_auditor_core::{
    Column, Table,
    diff::diff_tables,
    viewdef::{clean_view_definition, render_create_view, render_view_sql, table_from_view_sql},
};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = String> {
    // Avoid keywords so that generated names never read as grammar tokens
    "[a-z][a-z0-9_]{0,12}".prop_filter("keyword", |s| {
        !matches!(s.as_str(), "as" | "if" | "from" | "where" | "select" | "null")
    })
}

fn condition() -> impl Strategy<Value = String> {
    prop_oneof![
        identifier(),
        (identifier(), 0u8..16).prop_map(|(c, n)| format!("{} & {}", c, n)),
        (identifier(), identifier()).prop_map(|(a, b)| format!("{} in ({}, {})", a, a, b)),
        identifier().prop_map(|c| format!("{} = 'x,y'", c)),
    ]
}

fn column() -> impl Strategy<Value = Column> {
    (identifier(), 0u8..3, condition()).prop_map(|(name, kind, condition)| match kind {
        0 => Column::whitelisted(name),
        1 => Column::nulled(name),
        _ => Column::null_if(name, condition),
    })
}

fn table() -> impl Strategy<Value = Table> {
    (
        identifier(),
        identifier(),
        prop::collection::vec(column(), 1..8),
        prop::option::of(condition()),
    )
        .prop_map(|(name, table_name, columns, predicate)| {
            let mut table = Table::new(name).with_table_name(table_name);
            table.include_row_if = predicate;
            for column in columns {
                table.add_column(column);
            }
            table
        })
}

proptest! {
    #[test]
    fn parse_inverts_render(table in table(), db in identifier()) {
        let sql = render_view_sql(&table, &db);
        let parsed = table_from_view_sql(&sql, &table.name).unwrap();
        prop_assert_eq!(parsed, table);
    }

    #[test]
    fn rendered_create_view_has_only_row_filter_diff(table in table(), db in identifier()) {
        let create = render_create_view(&table, &db);
        let cleaned = clean_view_definition(&create, &db).unwrap();
        let parsed = table_from_view_sql(&cleaned, &table.name).unwrap();

        match diff_tables(&table, &parsed) {
            None => prop_assert!(table.include_row_if.is_none()),
            Some(diff) => {
                prop_assert!(diff.columns.is_none());
                prop_assert!(diff.table_name.is_none());
                let row_filter = diff.include_row_if.unwrap();
                prop_assert_eq!(
                    row_filter.found,
                    row_filter.expected.map(|p| format!("({})", p))
                );
            }
        }
    }

    #[test]
    fn parser_never_panics(input in ".{0,80}") {
        let _ = table_from_view_sql(&input, "v");
    }
}
