//! Unified error type for aggregate loading.
//!
//! Definition errors (bad aggregate specs, unknown relationships, unknown
//! columns) always carry the name of the aggregate or relationship that
//! caused them. Backend execution failures pass through unmodified.

use thiserror::Error;

/// Result type for aggregate operations.
pub type TallyResult<T> = Result<T, AggregateError>;

/// Errors raised while building, planning, or materializing aggregates.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// An aggregate definition violates the kind/field invariants.
    #[error("invalid aggregate '{aggregate}': {message}")]
    Definition { aggregate: String, message: String },

    /// A relationship name was not found on an entity.
    #[error("no such relationship '{relationship}' on entity '{entity}'")]
    UnknownRelationship { entity: String, relationship: String },

    /// An entity name was not found in the catalog.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// A column name was not found on an entity.
    #[error("unknown column '{column}' on entity '{entity}'")]
    UnknownColumn { entity: String, column: String },

    /// The catalog itself is malformed (bad JSON, missing through keys, ...).
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A result-row field name that is neither materialized nor computed.
    #[error("unknown field '{0}' on result row")]
    UnknownField(String),

    /// A computed field read itself (directly or through a chain).
    #[error("computed field '{0}' depends on itself")]
    ComputedCycle(String),

    /// A field held a value the accessor could not convert.
    #[error("field '{field}' is not {expected}: {value:?}")]
    FieldType {
        field: String,
        expected: &'static str,
        value: crate::value::Value,
    },

    /// A primary key value could not be cast to the declared key type.
    #[error("cannot cast primary key {value:?} to {expected:?}")]
    KeyCast {
        value: crate::value::Value,
        expected: crate::schema::ColumnType,
    },

    /// A structurally single-row query returned something else.
    #[error("expected exactly one aggregate row, got {actual}")]
    CardinalityViolation { actual: usize },

    /// Backend execution failure, surfaced as-is. No retry.
    #[error("execution failed: {0}")]
    Execution(String),

    /// SQLite driver failure (pass-through).
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl AggregateError {
    /// Shorthand for a definition error naming the offending aggregate.
    pub fn definition(aggregate: &str, message: impl Into<String>) -> Self {
        AggregateError::Definition {
            aggregate: aggregate.into(),
            message: message.into(),
        }
    }
}
