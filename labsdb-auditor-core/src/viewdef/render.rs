//! Rendering of a [`Table`] into view SQL.

use crate::models::{Column, Table};

fn select_expression(column: &Column) -> String {
    match (column.whitelisted, column.null_if.as_deref()) {
        (true, _) => column.name.clone(),
        (false, None) => "NULL".to_string(),
        (false, Some(condition)) => format!("if({},NULL,{})", condition, column.name),
    }
}

/// Renders the cleaned view body for `table`, in the form accepted by
/// [`parse_view_definition`](super::parse_view_definition).
pub fn render_view_sql(table: &Table, source_db: &str) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|column| format!("{} AS {}", select_expression(column), column.name))
        .collect();

    let mut sql = format!(
        "select {} from {}.{}",
        columns.join(","),
        source_db,
        table.table_name
    );
    if let Some(predicate) = &table.include_row_if {
        sql.push_str(" where ");
        sql.push_str(predicate);
    }
    sql
}

/// Renders `table` the way MySQL reports it in `SHOW CREATE VIEW`, with
/// every column qualified by `source_db` and the source table.
///
/// The row predicate is wrapped in parentheses the way MySQL prints it.
/// Conditions and predicates are otherwise emitted as written, and column
/// references inside them are not qualified.
pub fn render_create_view(table: &Table, source_db: &str) -> String {
    let qualifier = format!("`{}`.`{}`", source_db, table.table_name);

    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|column| {
            let qualified = format!("{}.`{}`", qualifier, column.name);
            let expr = match (column.whitelisted, column.null_if.as_deref()) {
                (true, _) => qualified,
                (false, None) => "NULL".to_string(),
                (false, Some(condition)) => format!("if({},NULL,{})", condition, qualified),
            };
            format!("{} AS `{}`", expr, column.name)
        })
        .collect();

    let mut sql = format!(
        "CREATE ALGORITHM=UNDEFINED DEFINER=`viewmaster`@`%` SQL SECURITY DEFINER VIEW `{}` AS select {} from {}",
        table.name,
        columns.join(","),
        qualifier
    );
    if let Some(predicate) = &table.include_row_if {
        sql.push_str(&format!(" where ({})", predicate));
    }
    sql
}
