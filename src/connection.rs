//! Database connections - the seam between planning and execution.
//!
//! A [`Connection`] knows its dialect and can run a SELECT. That is the
//! whole contract: the runner plans one statement, executes it once, and
//! materializes whatever came back. No retries, no transactions.

use std::cell::Cell;

use rusqlite::types::ValueRef;

use crate::error::TallyResult;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::value::{Row, Value};

/// A database backend capable of executing planned queries.
pub trait Connection {
    /// The SQL dialect queries against this backend are rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute a SELECT and return all rows as name -> value maps.
    fn execute_select(&self, sql: &str) -> TallyResult<Vec<Row>>;

    /// Quote an identifier in this backend's dialect.
    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    /// Quote a string literal in this backend's dialect.
    fn quote_literal(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }
}

/// An in-process SQLite backend.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open_in_memory() -> TallyResult<Self> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
        })
    }

    pub fn open(path: &str) -> TallyResult<Self> {
        Ok(Self {
            conn: rusqlite::Connection::open(path)?,
        })
    }

    /// Run DDL / seed statements, semicolon-separated.
    pub fn execute_batch(&self, sql: &str) -> TallyResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute_select(&self, sql: &str) -> TallyResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut map = Row::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Int(n),
                    ValueRef::Real(f) => Value::Float(f),
                    ValueRef::Text(bytes) => {
                        Value::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                    ValueRef::Blob(bytes) => {
                        Value::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                };
                map.insert(name.clone(), value);
            }
            out.push(map);
        }
        Ok(out)
    }
}

/// A wrapper that counts executed statements. Handy for asserting the
/// one-statement-per-load guarantee in tests and for instrumentation.
pub struct CountingConnection<C: Connection> {
    inner: C,
    executed: Cell<usize>,
}

impl<C: Connection> CountingConnection<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            executed: Cell::new(0),
        }
    }

    /// Number of SELECTs executed through this wrapper.
    pub fn executed(&self) -> usize {
        self.executed.get()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Connection> Connection for CountingConnection<C> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn execute_select(&self, sql: &str) -> TallyResult<Vec<Row>> {
        self.executed.set(self.executed.get() + 1);
        self.inner.execute_select(sql)
    }
}
