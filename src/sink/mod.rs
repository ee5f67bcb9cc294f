//! Persistence sinks
//!
//! A sink runs parameterized statements from the
//! [`StatementCatalog`](crate::catalog::StatementCatalog) and groups them into
//! commit units. The pipeline holds a single sink for the whole run and uses
//! it sequentially.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresSink;
pub use self::sqlite::SqliteSink;

use crate::catalog::StatementCatalog;
use crate::config::SinkTarget;
use crate::error::Result;
use crate::types::SqlValue;
use tracing::debug;

pub trait Sink {
    /// Run a statement, returning the number of affected rows.
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<usize>;

    /// Run a query and return its first row, if any.
    fn fetch_one(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Option<Vec<SqlValue>>>;

    /// Durably apply everything executed since the last commit.
    fn commit(&mut self) -> Result<()>;

    /// Discard everything executed since the last commit.
    fn rollback(&mut self) -> Result<()>;

    /// Create the five tables if they are missing, as one commit unit
    fn create_tables(&mut self, catalog: &StatementCatalog) -> Result<()> {
        for statement in &catalog.create_tables {
            self.execute(statement, &[])?;
        }
        self.commit()?;
        debug!("Created {} tables", catalog.create_tables.len());
        Ok(())
    }

    fn drop_tables(&mut self, catalog: &StatementCatalog) -> Result<()> {
        for statement in &catalog.drop_tables {
            self.execute(statement, &[])?;
        }
        self.commit()?;
        debug!("Dropped {} tables", catalog.drop_tables.len());
        Ok(())
    }
}

/// Open the sink a run is configured for
pub fn open_sink(target: &SinkTarget) -> Result<Box<dyn Sink>> {
    Ok(match target {
        SinkTarget::Sqlite(path) => Box::new(SqliteSink::open(path)?),
        SinkTarget::Postgres(url) => Box::new(PostgresSink::connect(url)?),
    })
}
