//! SQL generation: tokens, expressions, queries, and dialects.
//!
//! The layering runs bottom-up:
//!
//! - [`token`]: atomic SQL output units, serialized per dialect
//! - [`expr`]: strongly-typed expression AST
//! - [`query`]: SELECT statement builder
//! - [`dialect`]: per-database syntax differences

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;
