//! Materialized results - one generic row type for every spec.
//!
//! A [`ResultRow`] holds the aggregate values for one parent row plus the
//! computed fields declared on the spec. Computed fields evaluate lazily
//! on first read and memoize on the row; a computed field reading another
//! computed field is fine, a cycle is a
//! [`ComputedCycle`](crate::error::AggregateError::ComputedCycle) error
//! instead of a stack overflow.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::aggregate::{AggregateDefinition, AggregateKind, Compute};
use crate::error::{AggregateError, TallyResult};
use crate::planner::PK_ALIAS;
use crate::schema::ColumnType;
use crate::value::{Key, Params, Row, Value};

// In-progress entries are keyed by (field, thread): a cycle is the same
// thread re-entering a field it is already computing. Two threads racing
// on the same field is not a cycle; both compute and the first writer
// wins.
#[derive(Debug, Default)]
struct Memo {
    done: HashMap<String, Value>,
    in_progress: HashSet<(String, ThreadId)>,
}

/// One materialized result row.
pub struct ResultRow {
    values: HashMap<String, Value>,
    computed: HashMap<String, Compute>,
    params: Params,
    memo: Mutex<Memo>,
}

impl fmt::Debug for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRow")
            .field("values", &self.values)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResultRow {
    pub(crate) fn new(row: Row, computed: HashMap<String, Compute>, params: Params) -> Self {
        let values = row
            .into_iter()
            .map(|(name, value)| (name, value.normalize()))
            .collect();
        Self {
            values,
            computed,
            params,
            memo: Mutex::new(Memo::default()),
        }
    }

    /// Read a field by name: a materialized aggregate directly, a computed
    /// field through lazy evaluation and memoization.
    pub fn get(&self, name: &str) -> TallyResult<Value> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        let Some(compute) = self.computed.get(name) else {
            return Err(AggregateError::UnknownField(name.into()));
        };

        let thread = thread::current().id();
        {
            let mut memo = self.memo.lock().expect("memo lock poisoned");
            if let Some(value) = memo.done.get(name) {
                return Ok(value.clone());
            }
            if !memo.in_progress.insert((name.into(), thread)) {
                return Err(AggregateError::ComputedCycle(name.into()));
            }
        }

        // Lock released while computing so the closure may read other
        // fields of this row (including other computed fields).
        let result = compute(self, &self.params);

        let mut memo = self.memo.lock().expect("memo lock poisoned");
        memo.in_progress.remove(&(name.to_string(), thread));
        let value = result?;
        Ok(memo.done.entry(name.into()).or_insert(value).clone())
    }

    /// The field as an integer.
    pub fn get_i64(&self, name: &str) -> TallyResult<i64> {
        let value = self.get(name)?;
        value.as_i64().ok_or_else(|| AggregateError::FieldType {
            field: name.into(),
            expected: "an integer",
            value,
        })
    }

    /// The field as a float. Integers widen.
    pub fn get_f64(&self, name: &str) -> TallyResult<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| AggregateError::FieldType {
            field: name.into(),
            expected: "a number",
            value,
        })
    }

    /// The field as text.
    pub fn get_str(&self, name: &str) -> TallyResult<String> {
        let value = self.get(name)?;
        match value {
            Value::Text(s) => Ok(s),
            other => Err(AggregateError::FieldType {
                field: name.into(),
                expected: "text",
                value: other,
            }),
        }
    }

    /// Every field name readable on this row, materialized and computed.
    pub fn field_names(&self) -> Vec<&str> {
        self.values
            .keys()
            .chain(self.computed.keys())
            .map(String::as_str)
            .collect()
    }
}

/// Materialized rows for a whole scope, keyed by type-cast primary key.
#[derive(Debug, Default)]
pub struct ResultSet {
    rows: HashMap<Key, ResultRow>,
}

impl ResultSet {
    pub fn get(&self, key: &Key) -> Option<&ResultRow> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &ResultRow)> {
        self.rows.iter()
    }

    pub(crate) fn remove(&mut self, key: &Key) -> Option<ResultRow> {
        self.rows.remove(key)
    }
}

/// The computed-field table shared by every row of one load.
pub(crate) fn computed_table(defs: &[AggregateDefinition]) -> HashMap<String, Compute> {
    defs.iter()
        .filter(|d| d.kind == AggregateKind::Computed)
        .map(|d| {
            let compute = d.compute.clone().expect("validated computed field");
            (d.name.clone(), compute)
        })
        .collect()
}

/// Materialize per-scope rows into a key-addressed set. The key column is
/// cast to the parent's declared primary-key type so callers can look up
/// by native key values.
pub(crate) fn materialize(
    raw: Vec<Row>,
    pk_type: ColumnType,
    defs: &[AggregateDefinition],
    params: &Params,
) -> TallyResult<ResultSet> {
    let computed = computed_table(defs);
    let mut rows = HashMap::with_capacity(raw.len());
    for mut row in raw {
        let pk = row
            .remove(PK_ALIAS)
            .ok_or_else(|| AggregateError::Execution("result row has no key column".into()))?;
        let key = Key::cast(&pk, pk_type)?;
        rows.insert(key, ResultRow::new(row, computed.clone(), params.clone()));
    }
    Ok(ResultSet { rows })
}

/// Materialize a combined-mode result: exactly one row, by construction.
pub(crate) fn materialize_single(
    mut raw: Vec<Row>,
    defs: &[AggregateDefinition],
    params: &Params,
) -> TallyResult<ResultRow> {
    if raw.len() != 1 {
        return Err(AggregateError::CardinalityViolation { actual: raw.len() });
    }
    let row = raw.pop().expect("length checked");
    Ok(ResultRow::new(row, computed_table(defs), params.clone()))
}
