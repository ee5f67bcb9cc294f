use super::Sink;
use crate::error::{EtlError, Result};
use crate::types::{SqlValue, Table};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use tracing::info;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Result<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(EtlError::SinkMessage(
                "unexpected BLOB column in query result".to_string(),
            ))
        }
    })
}

/// SQLite-backed sink.
///
/// A transaction is opened lazily by the first statement after a commit, so
/// each commit unit is atomic. Uncommitted work is lost if the sink is dropped.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened SQLite sink at {}", path.as_ref().display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteSink { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count_rows(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<usize> {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(statement)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn fetch_one(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Option<Vec<SqlValue>>> {
        let mut stmt = self.conn.prepare_cached(statement)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let values = (0..column_count)
            .map(|i| from_value_ref(row.get_ref(i)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(values))
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}
