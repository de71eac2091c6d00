//! Query planner - turns a list of aggregate definitions plus a loading
//! mode into exactly one SELECT statement.
//!
//! Three modes, two query shapes:
//!
//! - **Per-scope** - one result row per parent row. The parent table is
//!   aliased and every relational aggregate becomes a correlated scalar
//!   subquery projection next to the parent primary key.
//! - **Single** - one parent row by primary key. Planned as a per-scope
//!   query over a synthesized `pk = key` scope, so both paths share one
//!   shape.
//! - **Combined** - the whole scope collapsed into one row. No FROM
//!   clause at all; the query is structurally incapable of returning more
//!   than one row. Scope membership travels through a CTE when the
//!   dialect supports one, otherwise through an IN-subquery per
//!   aggregate.

use crate::aggregate::{compile, AggregateDefinition, AggregateKind, ColumnSource, Relation};
use crate::error::{AggregateError, TallyResult};
use crate::resolver::{resolve, OuterRef, TargetScope};
use crate::schema::{Catalog, Entity};
use crate::scope::Scope;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{raw_sql, table_col, Expr};
use crate::sql::query::{Cte, Query, SelectExpr, TableRef};
use crate::value::{Key, Params};

/// Alias of the parent table in per-scope queries.
pub const OUTER_ALIAS: &str = "tally_outer";
/// Alias of the parent primary key projection.
pub const PK_ALIAS: &str = "tally_pk";
/// Name of the scope CTE in combined queries.
pub const SCOPE_CTE: &str = "tally_scope";

/// How the parent rows are selected and shaped.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// One result row per parent row in the scope.
    PerScope(&'a Scope),
    /// One result row for one parent, by primary key.
    Single(&'a Key),
    /// One result row aggregating the entire scope.
    Combined(&'a Scope),
}

/// Plan one query for the given definitions. Pure: no connection, no
/// execution, just SQL construction.
pub fn plan(
    catalog: &Catalog,
    entity_name: &str,
    defs: &[AggregateDefinition],
    mode: Mode<'_>,
    params: &Params,
    dialect: Dialect,
) -> TallyResult<Query> {
    let entity = catalog.entity(entity_name)?;
    match mode {
        Mode::PerScope(scope) => per_scope(catalog, entity, defs, scope, params),
        Mode::Single(key) => {
            let scope = Scope::new().eq(&entity.primary_key, key.to_value());
            per_scope(catalog, entity, defs, &scope, params)
        }
        Mode::Combined(scope) => combined(catalog, entity, defs, scope, params, dialect),
    }
}

fn refined(
    catalog: &Catalog,
    entity: &Entity,
    outer: &OuterRef<'_>,
    relation: &Relation,
    params: &Params,
) -> TallyResult<TargetScope> {
    let mut target = resolve(catalog, entity, outer, &relation.name)?;
    if let Some(refine) = &relation.refine {
        target = refine(target, params);
    }
    Ok(target)
}

fn per_scope(
    catalog: &Catalog,
    entity: &Entity,
    defs: &[AggregateDefinition],
    scope: &Scope,
    params: &Params,
) -> TallyResult<Query> {
    let outer = OuterRef::Alias(OUTER_ALIAS);
    let mut select = vec![
        SelectExpr::new(table_col(OUTER_ALIAS, &entity.primary_key)).with_alias(PK_ALIAS),
    ];

    for def in defs {
        match def.kind {
            AggregateKind::Computed => continue,
            AggregateKind::Column => {
                match def.source.as_ref().expect("validated column projection") {
                    ColumnSource::Attribute(attr) => {
                        if !entity.has_column(attr) {
                            return Err(AggregateError::UnknownColumn {
                                entity: entity.name.clone(),
                                column: attr.clone(),
                            });
                        }
                        select.push(
                            SelectExpr::new(table_col(OUTER_ALIAS, attr)).with_alias(&def.name),
                        );
                    }
                    ColumnSource::Relation(rel) => {
                        select.push(column_subquery(catalog, entity, &outer, def, rel, params)?);
                    }
                }
            }
            AggregateKind::Custom => {
                let sql = def.expression.as_deref().expect("validated custom projection");
                select.push(SelectExpr::new(raw_sql(sql)).with_alias(&def.name));
            }
            _ => {
                let target = refined(catalog, entity, &outer, def.relation.as_ref().expect("validated relational aggregate"), params)?;
                select.push(compile::compile(def, target)?);
            }
        }
    }

    let mut query = Query::new()
        .select(select)
        .from(TableRef::new(&entity.table).with_alias(OUTER_ALIAS));
    if let Some(expr) = scope.to_expr(OUTER_ALIAS) {
        query = query.filter(expr);
    }
    Ok(query)
}

fn combined(
    catalog: &Catalog,
    entity: &Entity,
    defs: &[AggregateDefinition],
    scope: &Scope,
    params: &Params,
    dialect: Dialect,
) -> TallyResult<Query> {
    let use_cte = dialect.supports_cte();
    let outer = if use_cte {
        OuterRef::CteMembership {
            cte: SCOPE_CTE,
            key: &entity.primary_key,
        }
    } else {
        OuterRef::ScopeIn { entity, scope }
    };

    let mut select = Vec::with_capacity(defs.len());
    for def in defs {
        match def.kind {
            AggregateKind::Computed => continue,
            AggregateKind::Column => match def.source.as_ref().expect("validated column projection") {
                ColumnSource::Attribute(_) => {
                    return Err(AggregateError::definition(
                        &def.name,
                        "attribute projections are per-row and cannot appear in a combined load",
                    ));
                }
                ColumnSource::Relation(rel) => {
                    select.push(column_subquery(catalog, entity, &outer, def, rel, params)?);
                }
            },
            AggregateKind::Custom => {
                let sql = def.expression.as_deref().expect("validated custom projection");
                select.push(SelectExpr::new(raw_sql(sql)).with_alias(&def.name));
            }
            _ => {
                let target = refined(catalog, entity, &outer, def.relation.as_ref().expect("validated relational aggregate"), params)?;
                select.push(compile::compile(def, target)?);
            }
        }
    }

    // No FROM clause: the statement yields exactly one row by shape.
    let mut query = Query::new().select(select);
    if use_cte {
        let mut inner = Query::new()
            .select_star()
            .from(TableRef::new(&entity.table));
        if let Some(expr) = scope.to_expr(&entity.table) {
            inner = inner.filter(expr);
        }
        query = query.with_cte(Cte::new(SCOPE_CTE, inner));
    }
    Ok(query)
}

/// A `column_from` projection: the relation (after refinement) must have
/// picked a single column, otherwise the subquery would be malformed SQL.
fn column_subquery(
    catalog: &Catalog,
    entity: &Entity,
    outer: &OuterRef<'_>,
    def: &AggregateDefinition,
    relation: &Relation,
    params: &Params,
) -> TallyResult<SelectExpr> {
    let target = refined(catalog, entity, outer, relation, params)?;
    if !target.has_projection() {
        return Err(AggregateError::definition(
            &def.name,
            "column relation must select a single column (use select_column in the refinement)",
        ));
    }
    Ok(SelectExpr::new(Expr::Subquery(Box::new(target.into_query()))).with_alias(&def.name))
}
