//! Normalization of raw `SHOW CREATE VIEW` output.
//!
//! MySQL reports a view as
//!
//! ```text
//! CREATE ALGORITHM=UNDEFINED DEFINER=`viewmaster`@`%` SQL SECURITY DEFINER
//! VIEW `logging` AS select `enwiki`.`logging`.`log_id` AS `log_id`,... from `enwiki`.`logging`
//! ```
//!
//! The parser only understands the SELECT body with bare column names, so the
//! preamble, the backticks and every `source_db.source_table.` prefix are
//! removed first. This is a textual rewrite, not part of the grammar.

use super::ViewParseError;
use regex::Regex;
use std::sync::OnceLock;

fn view_body_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)\bVIEW\s+`(?:[^`]|``)+`(?:\.`(?:[^`]|``)+`)?\s+AS\s+(.*)$")
            .expect("Invalid view body pattern")
    })
}

/// Returns the SELECT body of a `CREATE VIEW` statement.
///
/// # Errors
/// Returns [`ViewParseError::MissingViewBody`] when no ``VIEW `name` AS``
/// clause is present.
pub fn extract_view_body(create_sql: &str) -> Result<&str, ViewParseError> {
    view_body_pattern()
        .captures(create_sql)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim())
        .ok_or(ViewParseError::MissingViewBody)
}

fn from_table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bfrom\s+([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)")
            .expect("Invalid from table pattern")
    })
}

/// The table named by the first `from <source_db>.<table>` clause of a
/// backtick-free view body.
pub fn from_table<'a>(body: &'a str, source_db: &str) -> Option<&'a str> {
    from_table_pattern()
        .captures_iter(body)
        .find(|caps| &caps[1] == source_db)
        .and_then(|caps| caps.get(2))
        .map(|table| table.as_str())
}

/// Reduces raw `SHOW CREATE VIEW` output to the form accepted by the parser.
///
/// `source_db` is the private database the view reads from. Column
/// qualifiers are stripped for the table the view selects from, which may
/// differ from the table the model expects.
pub fn clean_view_definition(create_sql: &str, source_db: &str) -> Result<String, ViewParseError> {
    let body = extract_view_body(create_sql)?.replace('`', "");
    let Some(table) = from_table(&body, source_db) else {
        return Ok(body);
    };
    let qualifier = format!("{}.{}.", source_db, table);
    Ok(body.replace(&qualifier, ""))
}
