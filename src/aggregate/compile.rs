//! Aggregate function compiler - maps a definition plus an
//! already-restricted target scope into the scalar subquery expression
//! projected for it.
//!
//! NULL defaulting is deliberate and exact: `sum`/`min`/`max` coalesce to
//! 0, `avg` to 0.0, so a parent with zero related rows materializes
//! numeric zeros instead of NULLs. `string_agg` is the exception - it
//! stays NULL when nothing matched.

use crate::aggregate::{AggregateDefinition, AggregateKind};
use crate::error::{AggregateError, TallyResult};
use crate::resolver::TargetScope;
use crate::sql::expr::{
    avg, cast_text, coalesce, count, count_distinct, count_star, lit_float, lit_int, max, min,
    raw_sql, string_agg, sum, table_col, Expr,
};
use crate::sql::query::SelectExpr;

/// Compile a relational aggregate into its correlated scalar subquery,
/// aliased to the aggregate's name.
pub fn compile(def: &AggregateDefinition, target: TargetScope) -> TallyResult<SelectExpr> {
    let agg = aggregate_expr(def, &target)?;
    let query = target.into_query().select(vec![agg]);
    Ok(SelectExpr::new(Expr::Subquery(Box::new(query))).with_alias(&def.name))
}

/// The aggregate's SELECT-clause expression inside the subquery.
fn aggregate_expr(def: &AggregateDefinition, target: &TargetScope) -> TallyResult<Expr> {
    let column = |name: &Option<String>| -> TallyResult<Expr> {
        let name = name.as_deref().expect("validated column aggregate");
        if !target.entity().has_column(name) {
            return Err(AggregateError::definition(
                &def.name,
                format!(
                    "'{}' is not a column of '{}'",
                    name,
                    target.entity().name
                ),
            ));
        }
        Ok(table_col(target.table(), name))
    };
    let expr = |e: &Option<String>| raw_sql(e.as_deref().expect("validated expression aggregate"));

    Ok(match def.kind {
        AggregateKind::Count => count_star(),
        AggregateKind::CountExpr => count(expr(&def.expression)),
        AggregateKind::CountDistinct => count_distinct(column(&def.column)?),
        AggregateKind::CountDistinctExpr => count_distinct(expr(&def.expression)),

        AggregateKind::Sum => coalesce(vec![sum(column(&def.column)?), lit_int(0)]),
        AggregateKind::SumExpr => coalesce(vec![sum(expr(&def.expression)), lit_int(0)]),
        AggregateKind::Avg => coalesce(vec![avg(column(&def.column)?), lit_float(0.0)]),
        AggregateKind::AvgExpr => coalesce(vec![avg(expr(&def.expression)), lit_float(0.0)]),
        AggregateKind::Min => coalesce(vec![min(column(&def.column)?), lit_int(0)]),
        AggregateKind::MinExpr => coalesce(vec![min(expr(&def.expression)), lit_int(0)]),
        AggregateKind::Max => coalesce(vec![max(column(&def.column)?), lit_int(0)]),
        AggregateKind::MaxExpr => coalesce(vec![max(expr(&def.expression)), lit_int(0)]),

        AggregateKind::StringAgg => string_agg(column(&def.column)?, def.delimiter.as_deref()),
        // Expressions may be numeric; cast so concatenation is well-typed.
        AggregateKind::StringAggExpr => string_agg(
            cast_text(expr(&def.expression)),
            def.delimiter.as_deref(),
        ),

        AggregateKind::Column | AggregateKind::Custom | AggregateKind::Computed => {
            unreachable!("non-relational kinds are projected by the planner")
        }
    })
}
