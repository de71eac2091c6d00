//! Runtime values - what flows between the backend and result rows.

use std::collections::HashMap;

use crate::error::{AggregateError, TallyResult};
use crate::schema::ColumnType;
use crate::sql::expr::{lit_bool, lit_float, lit_int, lit_null, lit_str, Expr};

/// A single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Normalize driver differences: some backends return booleans as
    /// true/false, others as 1/0. Everything becomes 1/0 here so
    /// caller-visible behavior does not depend on the active dialect.
    pub fn normalize(self) -> Value {
        match self {
            Value::Bool(b) => Value::Int(if b { 1 } else { 0 }),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render this value as a SQL literal expression.
    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Null => lit_null(),
            Value::Int(n) => lit_int(*n),
            Value::Float(f) => lit_float(*f),
            Value::Text(s) => lit_str(s),
            Value::Bool(b) => lit_bool(*b),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(u: uuid::Uuid) -> Self {
        Value::Text(u.to_string())
    }
}

/// A result row as returned by the backend: column name -> value.
pub type Row = HashMap<String, Value>;

/// Caller-supplied named parameters, bound at call time.
pub type Params = HashMap<String, Value>;

/// A type-cast primary key, usable as a map key.
///
/// Raw backend values are strings or integers; casting honors the parent
/// entity's declared primary-key column type so lookups by native key
/// values succeed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Text(String),
    Uuid(uuid::Uuid),
}

impl Key {
    /// Cast a raw backend value into a key of the declared column type.
    pub fn cast(value: &Value, column_type: ColumnType) -> TallyResult<Key> {
        let fail = || AggregateError::KeyCast {
            value: value.clone(),
            expected: column_type,
        };
        match column_type {
            ColumnType::Integer | ColumnType::BigInt => match value {
                Value::Int(n) => Ok(Key::Int(*n)),
                Value::Text(s) => s.parse().map(Key::Int).map_err(|_| fail()),
                _ => Err(fail()),
            },
            ColumnType::Uuid => match value {
                Value::Text(s) => uuid::Uuid::parse_str(s).map(Key::Uuid).map_err(|_| fail()),
                _ => Err(fail()),
            },
            ColumnType::Text => match value {
                Value::Text(s) => Ok(Key::Text(s.clone())),
                Value::Int(n) => Ok(Key::Text(n.to_string())),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        }
    }

    /// The value to compare against the primary-key column in SQL.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(n) => Value::Int(*n),
            Key::Text(s) => Value::Text(s.clone()),
            Key::Uuid(u) => Value::Text(u.to_string()),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.into())
    }
}

impl From<uuid::Uuid> for Key {
    fn from(u: uuid::Uuid) -> Self {
        Key::Uuid(u)
    }
}
