//! Relationship resolver - turns a named relationship traversal into a
//! target-entity query restricted to rows related to an outer reference.
//!
//! Three interchangeable join-predicate strategies, selected by the
//! planner's mode via [`OuterRef`]:
//!
//! - **Correlated**: the predicate references the outer table alias
//!   directly (per-parent-row subqueries)
//! - **CTE membership**: the predicate restricts via
//!   `IN (SELECT key FROM cte)` (combined mode, CTE-capable dialects)
//! - **Scope IN-subquery**: the predicate restricts via
//!   `IN (SELECT key FROM table WHERE scope)` (combined mode fallback)
//!
//! Relationship names are an explicit lookup-or-error; ad hoc refinement
//! of the resolved target happens through [`TargetScope`]'s pass-through
//! methods, never through the relationship lookup.

use crate::error::TallyResult;
use crate::schema::{Catalog, Entity, RelationshipKind};
use crate::scope::Scope;
use crate::sql::expr::{exists, lit_int, table_col, Expr, ExprExt};
use crate::sql::query::{Query, TableRef};
use crate::value::Value;

/// The outer-row reference a relationship traversal is issued from.
#[derive(Debug, Clone, Copy)]
pub enum OuterRef<'a> {
    /// Correlated: predicates reference this parent-table alias.
    Alias(&'a str),
    /// CTE membership: predicates restrict against `SELECT key FROM cte`.
    CteMembership { cte: &'a str, key: &'a str },
    /// IN-subquery: predicates restrict against the scoped parent table.
    ScopeIn {
        entity: &'a Entity,
        scope: &'a Scope,
    },
}

impl<'a> OuterRef<'a> {
    /// An expression selecting the outer side's value of `column`
    /// (correlated), or a membership predicate builder input (set modes).
    fn membership(&self, column: &str, target_expr: Expr) -> Expr {
        match self {
            OuterRef::Alias(alias) => target_expr.eq(table_col(alias, column)),
            OuterRef::CteMembership { cte, .. } => {
                target_expr.in_query(
                    Query::new()
                        .select(vec![table_col(cte, column)])
                        .from(TableRef::new(cte)),
                )
            }
            OuterRef::ScopeIn { entity, scope } => {
                target_expr.in_query(scope.key_query(entity, column))
            }
        }
    }
}

/// A target-entity query already restricted to rows related to the outer
/// reference. Aggregate definitions refine it through these pass-through
/// methods; the compiler then replaces its projection with the aggregate.
#[derive(Debug, Clone)]
pub struct TargetScope {
    entity: Entity,
    query: Query,
}

impl TargetScope {
    pub(crate) fn new(entity: Entity, query: Query) -> Self {
        Self { entity, query }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.entity.table
    }

    /// Restrict to rows where `column = value` on the target table.
    pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value: Value = value.into();
        self.query = self
            .query
            .filter(table_col(&self.entity.table, column).eq(value.to_expr()));
        self
    }

    /// Restrict by an arbitrary expression.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.query = self.query.filter(expr);
        self
    }

    /// Limit the target rows (used by single-row column subqueries).
    pub fn limit(mut self, n: u64) -> Self {
        self.query = self.query.limit(n);
        self
    }

    /// Project a single target column (used by column subqueries).
    pub fn select_column(mut self, column: &str) -> Self {
        self.query = Query {
            select: vec![table_col(&self.entity.table, column).into()],
            ..self.query
        };
        self
    }

    pub(crate) fn has_projection(&self) -> bool {
        !self.query.select.is_empty()
    }

    pub(crate) fn into_query(self) -> Query {
        self.query
    }
}

/// Resolve a named relationship from `entity` into a [`TargetScope`].
///
/// Unknown relationship names surface as
/// [`AggregateError::UnknownRelationship`](crate::error::AggregateError::UnknownRelationship).
pub fn resolve(
    catalog: &Catalog,
    entity: &Entity,
    outer: &OuterRef<'_>,
    name: &str,
) -> TallyResult<TargetScope> {
    let rel = entity.relationship(name)?;
    let target = catalog.entity(&rel.target)?;
    let target_table = target.table.clone();

    let predicate = match rel.kind {
        RelationshipKind::BelongsTo => {
            // target.pk relates to outer[fk]
            let fk = rel.foreign_key.as_deref().unwrap_or(&entity.primary_key);
            outer.membership(fk, table_col(&target_table, &target.primary_key))
        }
        RelationshipKind::HasMany | RelationshipKind::HasOne => {
            // target[fk] relates to outer.pk
            let fk = rel.foreign_key.as_deref().unwrap_or(&entity.primary_key);
            outer.membership(&entity.primary_key, table_col(&target_table, fk))
        }
        RelationshipKind::HasManyThrough => {
            // EXISTS (SELECT 1 FROM join WHERE join.target_key = target.pk
            //                             AND join.source_key ~ outer.pk)
            // The EXISTS shape deduplicates: multiple join rows pointing at
            // the same target contribute one target row.
            let through = rel.through.as_ref().expect("validated through relationship");
            let join = catalog.entity(&through.entity)?;
            let join_table = join.table.clone();
            let inner = Query::new()
                .select(vec![lit_int(1)])
                .from(TableRef::new(&join_table))
                .filter(
                    table_col(&join_table, &through.target_key)
                        .eq(table_col(&target_table, &target.primary_key)),
                )
                .filter(outer.membership(
                    &entity.primary_key,
                    table_col(&join_table, &through.source_key),
                ));
            exists(inner)
        }
    };

    let query = Query::new()
        .from(TableRef::new(&target_table))
        .filter(predicate);
    Ok(TargetScope::new(target.clone(), query))
}
