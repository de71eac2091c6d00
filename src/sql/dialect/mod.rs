//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for the dialect
//! differences aggregate planning actually hits:
//!
//! - Identifier quoting: `"` (ANSI/Postgres/SQLite), `` ` `` (MySQL)
//! - Boolean literals: true/false vs 1/0
//! - String aggregation: LISTAGG vs STRING_AGG vs GROUP_CONCAT
//! - Text casting: CAST(.. AS VARCHAR/TEXT/CHAR)
//! - CTE availability (drives the combined-mode join strategy)
//!
//! # Usage
//!
//! ```ignore
//! use tally::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```

mod ansi;
pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;

pub use ansi::Ansi;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display and driver selection.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    ///
    /// - Postgres/SQLite: `true`/`false` (SQLite accepts both spellings)
    /// - MySQL: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    /// Whether WITH (common table expressions) can be emitted.
    ///
    /// Combined mode uses a scope CTE when available, falling back to
    /// IN-subquery joins otherwise.
    fn supports_cte(&self) -> bool {
        true
    }

    /// Type name used when casting a value to a string.
    ///
    /// MySQL only accepts `CHAR` inside CAST.
    fn text_cast_type(&self) -> &'static str {
        "VARCHAR"
    }

    /// Emit a string-aggregation call over the given expression tokens.
    ///
    /// ANSI default is `LISTAGG(expr [, 'delim'])`.
    fn emit_string_agg(&self, expr: &TokenStream, delimiter: Option<&str>) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("LISTAGG".into())).lparen();
        ts.append(expr);
        if let Some(delim) = delimiter {
            ts.comma().space().push(Token::LitString(delim.into()));
        }
        ts.rparen();
        ts
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Reference dialect; real backends rarely speak pure ANSI.
    #[default]
    Ansi,
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &Ansi,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
        }
    }

    /// Select a dialect by driver-reported name.
    pub fn from_name(name: &str) -> Option<Dialect> {
        match name {
            "ansi" => Some(Dialect::Ansi),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" => Some(Dialect::MySql),
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            _ => None,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn supports_cte(&self) -> bool {
        self.dialect().supports_cte()
    }

    fn text_cast_type(&self) -> &'static str {
        self.dialect().text_cast_type()
    }

    fn emit_string_agg(&self, expr: &TokenStream, delimiter: Option<&str>) -> TokenStream {
        self.dialect().emit_string_agg(expr, delimiter)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
