//! Redaction view definitions.
//!
//! Public databases expose each table through a view that passes whitelisted
//! columns through, nulls redacted ones (always, or via `if(cond, NULL, col)`)
//! and optionally filters rows. This module turns the live `SHOW CREATE VIEW`
//! text back into a [`Table`](crate::models::Table) so it can be diffed against
//! the declared model, and renders a table into the same SQL shape.
//!
//! # Module Structure
//! - `preprocess`: extraction of the SELECT body and removal of quoting and
//!   qualification prefixes
//! - `parser`: recursive-descent parser for the restricted view grammar
//! - `render`: the inverse of the parser

mod parser;
mod preprocess;
mod render;

pub use parser::{ColumnDefinition, ColumnExpr, ViewDefinition, parse_view_definition, table_from_view_sql};
pub use preprocess::{clean_view_definition, extract_view_body, from_table};
pub use render::{render_create_view, render_view_sql};

use thiserror::Error;

/// Reasons a view definition could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewParseError {
    /// The `SHOW CREATE VIEW` text has no `VIEW <name> AS <select>` part
    #[error("no SELECT body found in view definition")]
    MissingViewBody,

    /// A token other than the expected one was found
    #[error("expected {expected} at offset {offset}, found {found}")]
    Unexpected {
        expected: &'static str,
        offset: usize,
        found: String,
    },

    /// An `if(` condition ran to the end of input without its separating comma
    #[error("unterminated if() condition starting at offset {offset}")]
    UnterminatedCondition { offset: usize },
}
