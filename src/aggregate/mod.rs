//! Aggregate definitions and the spec builder.
//!
//! A [`SpecBuilder`] collects [`AggregateDefinition`]s for one parent
//! entity and finalizes them into an immutable [`Runner`](crate::runner::Runner).
//! Kind/field invariants are checked at build time - a malformed
//! definition is a definition error naming the aggregate, never a
//! runtime surprise.

pub mod compile;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AggregateError, TallyResult};
use crate::resolver::TargetScope;
use crate::result::ResultRow;
use crate::runner::Runner;
use crate::schema::Catalog;
use crate::value::{Params, Value};

/// Every supported aggregate kind.
///
/// `*Expr` variants aggregate over a raw SQL expression instead of a
/// column. `Column` projects a parent attribute or a single-row relation
/// subquery. `Custom` projects raw SQL verbatim. `Computed` is evaluated
/// client-side after materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    CountDistinct,
    CountExpr,
    CountDistinctExpr,
    Sum,
    SumExpr,
    Avg,
    AvgExpr,
    Min,
    MinExpr,
    Max,
    MaxExpr,
    StringAgg,
    StringAggExpr,
    Column,
    Custom,
    Computed,
}

impl AggregateKind {
    /// Whether this kind traverses a relationship into a subquery.
    pub fn is_relational(&self) -> bool {
        !matches!(
            self,
            AggregateKind::Column | AggregateKind::Custom | AggregateKind::Computed
        )
    }

    /// Whether this kind aggregates a raw SQL expression.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            AggregateKind::CountExpr
                | AggregateKind::CountDistinctExpr
                | AggregateKind::SumExpr
                | AggregateKind::AvgExpr
                | AggregateKind::MinExpr
                | AggregateKind::MaxExpr
                | AggregateKind::StringAggExpr
        )
    }

    /// Whether this kind aggregates a named target column.
    pub fn is_column_function(&self) -> bool {
        matches!(
            self,
            AggregateKind::CountDistinct
                | AggregateKind::Sum
                | AggregateKind::Avg
                | AggregateKind::Min
                | AggregateKind::Max
                | AggregateKind::StringAgg
        )
    }
}

/// Call-time refinement of a resolved relationship scope.
pub type Refine = Arc<dyn Fn(TargetScope, &Params) -> TargetScope + Send + Sync>;

/// Client-side computation over an already-materialized result row.
pub type Compute = Arc<dyn Fn(&ResultRow, &Params) -> TallyResult<Value> + Send + Sync>;

/// A relationship traversal inside an aggregate definition: the
/// relationship name, plus an optional refinement applied to the resolved
/// target scope with the call-time parameters.
#[derive(Clone)]
pub struct Relation {
    pub name: String,
    pub refine: Option<Refine>,
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("refine", &self.refine.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl From<&str> for Relation {
    fn from(name: &str) -> Self {
        Relation {
            name: name.into(),
            refine: None,
        }
    }
}

/// A bare relationship traversal.
pub fn rel(name: &str) -> Relation {
    Relation {
        name: name.into(),
        refine: None,
    }
}

/// A relationship traversal with a refinement block.
pub fn rel_where(
    name: &str,
    refine: impl Fn(TargetScope, &Params) -> TargetScope + Send + Sync + 'static,
) -> Relation {
    Relation {
        name: name.into(),
        refine: Some(Arc::new(refine)),
    }
}

/// The explicitly-tagged source of a `Column`-kind aggregate: either an
/// attribute on the parent's own table, or a relation expected to resolve
/// to a single-row, single-column scalar subquery. The tag replaces
/// try-one-interpretation-catch-fall-back disambiguation.
#[derive(Clone)]
pub enum ColumnSource {
    Attribute(String),
    Relation(Relation),
}

impl fmt::Debug for ColumnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSource::Attribute(name) => write!(f, "Attribute({:?})", name),
            ColumnSource::Relation(rel) => write!(f, "Relation({:?})", rel.name),
        }
    }
}

/// One declared aggregate.
#[derive(Clone)]
pub struct AggregateDefinition {
    pub name: String,
    pub kind: AggregateKind,
    pub relation: Option<Relation>,
    pub column: Option<String>,
    pub expression: Option<String>,
    pub delimiter: Option<String>,
    pub source: Option<ColumnSource>,
    pub compute: Option<Compute>,
}

// Closures are not Debug; render everything else.
impl fmt::Debug for AggregateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("relation", &self.relation)
            .field("column", &self.column)
            .field("expression", &self.expression)
            .field("delimiter", &self.delimiter)
            .field("source", &self.source)
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl AggregateDefinition {
    fn bare(name: &str, kind: AggregateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            relation: None,
            column: None,
            expression: None,
            delimiter: None,
            source: None,
            compute: None,
        }
    }

    /// Enforce the kind/field invariants. Called once at build time.
    pub fn validate(&self) -> TallyResult<()> {
        let fail = |msg: &str| Err(AggregateError::definition(&self.name, msg));
        if self.name.is_empty() {
            return Err(AggregateError::definition("<unnamed>", "aggregate name is empty"));
        }
        match self.kind {
            AggregateKind::Count => {
                if self.relation.is_none() {
                    return fail("count requires a relationship");
                }
            }
            k if k.is_column_function() => {
                if self.relation.is_none() {
                    return fail("column aggregates require a relationship");
                }
                if self.column.as_deref().map_or(true, str::is_empty) {
                    return fail("column aggregates require a column name");
                }
            }
            k if k.is_expression() => {
                if self.relation.is_none() {
                    return fail("expression aggregates require a relationship");
                }
                if self.expression.as_deref().map_or(true, str::is_empty) {
                    return fail("expression aggregates require a SQL expression");
                }
            }
            AggregateKind::Column => {
                if self.source.is_none() {
                    return fail("column projections require an attribute or relation source");
                }
            }
            AggregateKind::Custom => {
                if self.expression.as_deref().map_or(true, str::is_empty) {
                    return fail("custom projections require a SQL expression");
                }
            }
            AggregateKind::Computed => {
                if self.compute.is_none() {
                    return fail("computed fields require a compute function");
                }
            }
            _ => unreachable!("all kinds covered above"),
        }
        Ok(())
    }
}

/// Fluent collector for aggregate definitions.
///
/// The parent entity is an explicit parameter of every spec - there is no
/// ambient "current model". `build()` validates and finalizes into an
/// immutable [`Runner`].
pub struct SpecBuilder {
    catalog: Arc<Catalog>,
    entity: String,
    defs: Vec<AggregateDefinition>,
}

impl SpecBuilder {
    pub fn new(catalog: Arc<Catalog>, entity: &str) -> Self {
        Self {
            catalog,
            entity: entity.into(),
            defs: vec![],
        }
    }

    fn push(mut self, def: AggregateDefinition) -> Self {
        self.defs.push(def);
        self
    }

    /// `COUNT(*)` over a relationship.
    pub fn count(self, name: &str, relation: impl Into<Relation>) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Count);
        def.relation = Some(relation.into());
        self.push(def)
    }

    /// `COUNT(DISTINCT column)` over a relationship.
    pub fn count_distinct(self, name: &str, relation: impl Into<Relation>, column: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::CountDistinct);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        self.push(def)
    }

    /// `COUNT(raw expression)` over a relationship.
    pub fn count_expr(self, name: &str, relation: impl Into<Relation>, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::CountExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    /// `COUNT(DISTINCT raw expression)` over a relationship.
    pub fn count_distinct_expr(
        self,
        name: &str,
        relation: impl Into<Relation>,
        expression: &str,
    ) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::CountDistinctExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    /// `COALESCE(SUM(column), 0)` over a relationship.
    pub fn sum(self, name: &str, relation: impl Into<Relation>, column: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Sum);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        self.push(def)
    }

    pub fn sum_expr(self, name: &str, relation: impl Into<Relation>, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::SumExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    /// `COALESCE(AVG(column), 0.0)` over a relationship.
    pub fn avg(self, name: &str, relation: impl Into<Relation>, column: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Avg);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        self.push(def)
    }

    pub fn avg_expr(self, name: &str, relation: impl Into<Relation>, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::AvgExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    pub fn min(self, name: &str, relation: impl Into<Relation>, column: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Min);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        self.push(def)
    }

    pub fn min_expr(self, name: &str, relation: impl Into<Relation>, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::MinExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    pub fn max(self, name: &str, relation: impl Into<Relation>, column: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Max);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        self.push(def)
    }

    pub fn max_expr(self, name: &str, relation: impl Into<Relation>, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::MaxExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        self.push(def)
    }

    /// Dialect-aware string aggregation of a target column. NULL when no
    /// rows match - not defaulted, unlike the numeric aggregates.
    pub fn string_agg(
        self,
        name: &str,
        relation: impl Into<Relation>,
        column: &str,
        delimiter: Option<&str>,
    ) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::StringAgg);
        def.relation = Some(relation.into());
        def.column = Some(column.into());
        def.delimiter = delimiter.map(String::from);
        self.push(def)
    }

    /// String aggregation of a raw expression, cast to the dialect's
    /// string type first.
    pub fn string_agg_expr(
        self,
        name: &str,
        relation: impl Into<Relation>,
        expression: &str,
        delimiter: Option<&str>,
    ) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::StringAggExpr);
        def.relation = Some(relation.into());
        def.expression = Some(expression.into());
        def.delimiter = delimiter.map(String::from);
        self.push(def)
    }

    /// Project a parent-table attribute (optionally under a different name).
    pub fn column(self, name: &str, attribute: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Column);
        def.source = Some(ColumnSource::Attribute(attribute.into()));
        self.push(def)
    }

    /// Project a single-row, single-column correlated subquery. The
    /// relation's refinement is responsible for selecting exactly one
    /// column and limiting to one row.
    pub fn column_from(self, name: &str, relation: impl Into<Relation>) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Column);
        def.source = Some(ColumnSource::Relation(relation.into()));
        self.push(def)
    }

    /// Project raw SQL verbatim. Unescaped - the caller owns correctness
    /// and injection safety.
    pub fn custom(self, name: &str, expression: &str) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Custom);
        def.expression = Some(expression.into());
        self.push(def)
    }

    /// A client-side derived field, evaluated lazily against the
    /// materialized row (and memoized on it).
    pub fn computed(
        self,
        name: &str,
        compute: impl Fn(&ResultRow, &Params) -> TallyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        let mut def = AggregateDefinition::bare(name, AggregateKind::Computed);
        def.compute = Some(Arc::new(compute));
        self.push(def)
    }

    /// Validate every definition and finalize into an immutable runner.
    pub fn build(self) -> TallyResult<Runner> {
        self.catalog.entity(&self.entity)?;
        let mut seen = HashMap::new();
        for def in &self.defs {
            def.validate()?;
            if seen.insert(def.name.clone(), ()).is_some() {
                return Err(AggregateError::definition(
                    &def.name,
                    "duplicate aggregate name",
                ));
            }
        }
        Ok(Runner::new(self.catalog, self.entity, self.defs))
    }
}
