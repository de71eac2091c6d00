//! Tally - batch aggregate loading that compiles to multi-dialect SQL.
//!
//! Declare a set of aggregates over an entity's relationships once, then
//! load them for any scope of parent rows with exactly one SELECT
//! statement, on any supported database dialect.
//!
//! # Architecture
//!
//! ```text
//! SpecBuilder ──▶ Runner ──▶ Planner ──▶ Query (expr/token) ──▶ SQL string
//!      │                        │                                   │
//!   Catalog                 Resolver                           Connection
//!  (entities,            (relationships ▶                      (dialect +
//!  relationships)         join predicates)                      execute)
//!                                                                  │
//!                                              ResultSet ◀── Materializer
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally::prelude::*;
//!
//! # fn main() -> TallyResult<()> {
//! let catalog = Arc::new(
//!     Catalog::new()
//!         .add_entity(
//!             Entity::new("author")
//!                 .with_column("age", ColumnType::Integer)
//!                 .with_has_many("posts", "post", "author_id"),
//!         )
//!         .add_entity(Entity::new("post").with_column("views", ColumnType::Integer)),
//! );
//!
//! let spec = SpecBuilder::new(catalog, "author")
//!     .count("post_count", "posts")
//!     .sum("total_views", "posts", "views")
//!     .build()?;
//!
//! let conn = SqliteConnection::open_in_memory()?;
//! let results = spec.from(&conn, &Scope::new().eq("age", 30), &Params::new())?;
//! for (key, row) in results.iter() {
//!     println!("{key:?}: {} posts", row.get_i64("post_count")?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod connection;
pub mod error;
pub mod planner;
pub mod resolver;
pub mod result;
pub mod runner;
pub mod schema;
pub mod scope;
pub mod sql;
pub mod value;

pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// The types most callers need.
pub mod prelude {
    pub use crate::aggregate::{rel, rel_where, ColumnSource, Relation, SpecBuilder};
    pub use crate::connection::{Connection, CountingConnection, SqliteConnection};
    pub use crate::error::{AggregateError, TallyResult};
    pub use crate::result::{ResultRow, ResultSet};
    pub use crate::runner::Runner;
    pub use crate::schema::{Catalog, ColumnType, Entity};
    pub use crate::scope::Scope;
    pub use crate::sql::dialect::{Dialect, SqlDialect};
    pub use crate::value::{Key, Params, Row, Value};
}
