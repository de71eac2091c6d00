//! The runner - a finalized spec's loading API.
//!
//! Every load is plan, execute once, materialize. The three entry points
//! mirror the planner's modes: [`Runner::from`] for a whole scope,
//! [`Runner::only`] for one record, [`Runner::combined`] for the scope
//! collapsed into a single row.

use std::sync::Arc;

use crate::aggregate::AggregateDefinition;
use crate::connection::Connection;
use crate::error::{AggregateError, TallyResult};
use crate::planner::{plan, Mode};
use crate::result::{materialize, materialize_single, ResultRow, ResultSet};
use crate::schema::Catalog;
use crate::scope::Scope;
use crate::value::{Key, Params};

/// An immutable, validated aggregate spec bound to one parent entity.
#[derive(Debug)]
pub struct Runner {
    catalog: Arc<Catalog>,
    entity: String,
    defs: Vec<AggregateDefinition>,
}

impl Runner {
    pub(crate) fn new(catalog: Arc<Catalog>, entity: String, defs: Vec<AggregateDefinition>) -> Self {
        Self {
            catalog,
            entity,
            defs,
        }
    }

    /// The parent entity this spec loads for.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn definitions(&self) -> &[AggregateDefinition] {
        &self.defs
    }

    fn pk_type(&self) -> TallyResult<crate::schema::ColumnType> {
        let entity = self.catalog.entity(&self.entity)?;
        Ok(entity.pk_column().column_type)
    }

    /// Load aggregates for every parent row in `scope`, one statement.
    pub fn from<C: Connection>(
        &self,
        conn: &C,
        scope: &Scope,
        params: &Params,
    ) -> TallyResult<ResultSet> {
        let query = plan(
            &self.catalog,
            &self.entity,
            &self.defs,
            Mode::PerScope(scope),
            params,
            conn.dialect(),
        )?;
        let raw = conn.execute_select(&query.to_sql(conn.dialect()))?;
        materialize(raw, self.pk_type()?, &self.defs, params)
    }

    /// Load aggregates for a single parent row by primary key.
    ///
    /// A missing row is a cardinality error, not an empty result: the
    /// caller asked for exactly one.
    pub fn only<C: Connection>(
        &self,
        conn: &C,
        key: &Key,
        params: &Params,
    ) -> TallyResult<ResultRow> {
        let query = plan(
            &self.catalog,
            &self.entity,
            &self.defs,
            Mode::Single(key),
            params,
            conn.dialect(),
        )?;
        let raw = conn.execute_select(&query.to_sql(conn.dialect()))?;
        let mut set = materialize(raw, self.pk_type()?, &self.defs, params)?;
        set.remove(key)
            .ok_or(AggregateError::CardinalityViolation { actual: 0 })
    }

    /// Load the scope's aggregates collapsed into one row.
    pub fn combined<C: Connection>(
        &self,
        conn: &C,
        scope: &Scope,
        params: &Params,
    ) -> TallyResult<ResultRow> {
        let query = plan(
            &self.catalog,
            &self.entity,
            &self.defs,
            Mode::Combined(scope),
            params,
            conn.dialect(),
        )?;
        let raw = conn.execute_select(&query.to_sql(conn.dialect()))?;
        materialize_single(raw, &self.defs, params)
    }
}
