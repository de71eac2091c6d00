//! Scopes - row restrictions over the parent table.
//!
//! A scope is the "which parent rows to aggregate over" input. Only
//! equality and IN predicates are representable; anything richer is
//! unrepresentable by construction rather than silently dropped. Scopes
//! translate onto whatever table reference the planner is using (the
//! outer alias, the raw table inside a CTE, or a key subquery), so a
//! single scope serves every query shape.

use crate::schema::Entity;
use crate::sql::expr::{table_col, Expr, ExprExt};
use crate::sql::query::{Query, TableRef};
use crate::value::Value;

/// An equality or inclusion predicate over a parent-table column.
#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

/// A row restriction over the parent table. Empty means "all rows".
///
/// Consumed read-only by planning; never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    predicates: Vec<Predicate>,
}

impl Scope {
    /// The unrestricted scope.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to rows where `column = value`.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Restrict to rows where `column IN (values...)`.
    pub fn is_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.predicates.push(Predicate::In {
            column: column.into(),
            values,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Translate the predicates onto a table reference (the outer alias in
    /// per-scope mode, the bare table inside a CTE or key subquery).
    /// Returns `None` for the unrestricted scope.
    pub(crate) fn to_expr(&self, table: &str) -> Option<Expr> {
        let mut combined: Option<Expr> = None;
        for pred in &self.predicates {
            let expr = match pred {
                Predicate::Eq { column, value } => {
                    table_col(table, column).eq(value.to_expr())
                }
                Predicate::In { column, values } => {
                    table_col(table, column).in_list(values.iter().map(Value::to_expr).collect())
                }
            };
            combined = Some(match combined {
                Some(existing) => existing.and(expr),
                None => expr,
            });
        }
        combined
    }

    /// `SELECT <column> FROM <parent table> WHERE <predicates>` - the
    /// membership subquery used by the IN-subquery join strategy.
    pub(crate) fn key_query(&self, entity: &Entity, column: &str) -> Query {
        let mut q = Query::new()
            .select(vec![table_col(&entity.table, column)])
            .from(TableRef::new(&entity.table));
        if let Some(expr) = self.to_expr(&entity.table) {
            q = q.filter(expr);
        }
        q
    }
}
