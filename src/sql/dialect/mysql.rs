//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), literals are 1/0
//! - GROUP_CONCAT(expr SEPARATOR 'delim') for string aggregation
//! - CAST only accepts CHAR as the string target type
//! - Targets 5.7 semantics: no CTE support, so combined mode plans
//!   IN-subquery joins instead

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn supports_cte(&self) -> bool {
        false
    }

    fn text_cast_type(&self) -> &'static str {
        // CAST(x AS VARCHAR) is a syntax error in MySQL
        "CHAR"
    }

    fn emit_string_agg(&self, expr: &TokenStream, delimiter: Option<&str>) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("GROUP_CONCAT".into())).lparen();
        ts.append(expr);
        if let Some(delim) = delimiter {
            ts.space()
                .push(Token::Raw("SEPARATOR".into()))
                .space()
                .push(Token::LitString(delim.into()));
        }
        ts.rparen();
        ts
    }
}
