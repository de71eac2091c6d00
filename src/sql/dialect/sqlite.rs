//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - ANSI identifier quoting (`"`)
//! - GROUP_CONCAT(expr, 'delim') for string aggregation
//! - CAST(expr AS TEXT)
//! - CTE support

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn text_cast_type(&self) -> &'static str {
        "TEXT"
    }

    fn emit_string_agg(&self, expr: &TokenStream, delimiter: Option<&str>) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("GROUP_CONCAT".into())).lparen();
        ts.append(expr);
        if let Some(delim) = delimiter {
            ts.comma().space().push(Token::LitString(delim.into()));
        }
        ts.rparen();
        ts
    }
}
