//! ANSI SQL reference dialect.
//!
//! Exported as a reference implementation for testing and documentation;
//! real databases rarely speak pure ANSI. Uses LISTAGG for string
//! aggregation per SQL:2016.

use super::helpers;
use super::SqlDialect;

/// ANSI SQL reference dialect.
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_string_agg (LISTAGG) and text_cast_type (VARCHAR).
}
