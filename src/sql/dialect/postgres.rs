//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - STRING_AGG(expr, delimiter) - the delimiter argument is mandatory
//! - CAST(expr AS TEXT)
//! - CTE support

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
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
        ts.push(Token::FunctionName("STRING_AGG".into())).lparen();
        ts.append(expr);
        // STRING_AGG has no single-argument form; default to a comma.
        ts.comma()
            .space()
            .push(Token::LitString(delimiter.unwrap_or(",").into()));
        ts.rparen();
        ts
    }
}
