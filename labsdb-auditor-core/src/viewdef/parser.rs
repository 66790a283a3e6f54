//! Recursive-descent parser for redaction view SQL.
//!
//! Grammar of a cleaned view body:
//!
//! ```text
//! stmt       := "select" column_def ("," column_def)*
//!               "from" identifier "." identifier
//!               ("where" predicate)?
//! column_def := "if(" condition "," identifier "," identifier ")" "as" identifier
//!             | identifier "as" identifier
//! ```
//!
//! Identifiers are `[A-Za-z0-9_]+` and keywords are case-insensitive.
//! `condition` is carried verbatim up to the first comma outside parentheses
//! and quotes; `predicate` is everything after `where`.

use super::ViewParseError;
use crate::models::{Column, Table};

/// Source expression of one selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnExpr {
    /// `identifier AS out`, where the identifier may be the `NULL` literal
    Bare(String),
    /// `if(condition, then, otherwise) AS out`
    Conditional {
        condition: String,
        then: String,
        otherwise: String,
    },
}

/// One `expr AS out_name` entry of the select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub expr: ColumnExpr,
    pub out_name: String,
}

impl ColumnDefinition {
    /// Classifies the selected expression into a model column.
    ///
    /// A bare identifier passes the column through unless it is `NULL`; an
    /// `if()` nulls the column under its condition, and an empty condition
    /// degrades to a passthrough.
    pub fn to_column(&self) -> Column {
        match &self.expr {
            ColumnExpr::Bare(expr) if expr.eq_ignore_ascii_case("NULL") => {
                Column::nulled(self.out_name.clone())
            }
            ColumnExpr::Bare(_) => Column::whitelisted(self.out_name.clone()),
            ColumnExpr::Conditional { condition, .. } if condition.is_empty() => {
                Column::whitelisted(self.out_name.clone())
            }
            ColumnExpr::Conditional { condition, .. } => {
                Column::null_if(self.out_name.clone(), condition.clone())
            }
        }
    }
}

/// Structure of a parsed view body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub columns: Vec<ColumnDefinition>,
    pub source_db: String,
    pub source_table: String,
    pub predicate: Option<String>,
}

impl ViewDefinition {
    /// Builds the table model of the view named `view_name`.
    pub fn into_table(self, view_name: &str) -> Table {
        let mut table = Table::new(view_name).with_table_name(self.source_table);
        table.include_row_if = self.predicate;
        for definition in &self.columns {
            table.add_column(definition.to_column());
        }
        table
    }
}

/// Parses a cleaned view body into a table model named `view_name`.
pub fn table_from_view_sql(sql: &str, view_name: &str) -> Result<Table, ViewParseError> {
    Ok(parse_view_definition(sql)?.into_table(view_name))
}

/// Parses a cleaned view body.
///
/// # Errors
/// Returns a [`ViewParseError`] locating the first token that does not fit
/// the grammar.
pub fn parse_view_definition(sql: &str) -> Result<ViewDefinition, ViewParseError> {
    let mut cursor = Cursor::new(sql);

    cursor.expect_keyword("select", "'select'")?;
    let mut columns = vec![column_definition(&mut cursor)?];
    while cursor.eat_punct(',') {
        columns.push(column_definition(&mut cursor)?);
    }

    cursor.expect_keyword("from", "',' or 'from'")?;
    let source_db = cursor.expect_identifier("database name")?.to_string();
    cursor.expect_punct('.', "'.'")?;
    let source_table = cursor.expect_identifier("table name")?.to_string();

    let predicate = if cursor.eat_keyword("where") {
        let predicate = cursor.rest().trim();
        if predicate.is_empty() {
            return Err(cursor.unexpected("predicate after 'where'"));
        }
        Some(predicate.to_string())
    } else {
        cursor.skip_whitespace();
        if !cursor.at_end() {
            return Err(cursor.unexpected("'where' or end of input"));
        }
        None
    };

    Ok(ViewDefinition {
        columns,
        source_db,
        source_table,
        predicate,
    })
}

fn column_definition(cursor: &mut Cursor<'_>) -> Result<ColumnDefinition, ViewParseError> {
    let expr = if cursor.eat_if_call() {
        let condition = cursor.condition()?.trim().to_string();
        cursor.expect_punct(',', "',' after if() condition")?;
        let then = cursor.expect_identifier("if() result")?.to_string();
        cursor.expect_punct(',', "','")?;
        let otherwise = cursor.expect_identifier("if() alternative")?.to_string();
        cursor.expect_punct(')', "')'")?;
        ColumnExpr::Conditional {
            condition,
            then,
            otherwise,
        }
    } else {
        ColumnExpr::Bare(cursor.expect_identifier("column expression")?.to_string())
    };

    cursor.expect_keyword("as", "'as'")?;
    let out_name = cursor.expect_identifier("column alias")?.to_string();

    Ok(ColumnDefinition { expr, out_name })
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scanner over the view body.
///
/// Tokens are produced on demand because two productions (`condition` and
/// `predicate`) are raw slices of the input rather than token sequences.
#[derive(Debug, Clone)]
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.remaining().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn identifier(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let rest = self.remaining();
        let len = rest
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn expect_identifier(&mut self, expected: &'static str) -> Result<&'a str, ViewParseError> {
        self.identifier().ok_or_else(|| self.unexpected(expected))
    }

    /// Consumes `keyword` when it is the next whole word.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let mut lookahead = self.clone();
        match lookahead.identifier() {
            Some(word) if word.eq_ignore_ascii_case(keyword) => {
                *self = lookahead;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(
        &mut self,
        keyword: &str,
        expected: &'static str,
    ) -> Result<(), ViewParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.skip_whitespace();
            Err(self.unexpected(expected))
        }
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        self.skip_whitespace();
        if self.remaining().starts_with(punct) {
            self.pos += punct.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: char, expected: &'static str) -> Result<(), ViewParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Consumes `if (` so that an identifier named `if` is not mistaken for a call.
    fn eat_if_call(&mut self) -> bool {
        let mut lookahead = self.clone();
        if lookahead.eat_keyword("if") && lookahead.eat_punct('(') {
            *self = lookahead;
            true
        } else {
            false
        }
    }

    /// Captures an `if()` condition up to its separating comma.
    fn condition(&mut self) -> Result<&'a str, ViewParseError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (offset, c) in self.remaining().char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' if depth == 0 => {
                    self.pos = start + offset;
                    return Err(self.unexpected("',' after if() condition"));
                }
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    self.pos = start + offset;
                    return Ok(&self.src[start..self.pos]);
                }
                _ => {}
            }
        }

        Err(ViewParseError::UnterminatedCondition { offset: start })
    }

    fn rest(&mut self) -> &'a str {
        let rest = self.remaining();
        self.pos = self.src.len();
        rest
    }

    fn unexpected(&self, expected: &'static str) -> ViewParseError {
        let found = if self.at_end() {
            "end of input".to_string()
        } else {
            let snippet: String = self.remaining().chars().take(24).collect();
            format!("'{}'", snippet)
        };
        ViewParseError::Unexpected {
            expected,
            offset: self.pos,
            found,
        }
    }
}
