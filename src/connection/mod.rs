pub mod config;
pub mod pool;
pub mod sqlite;

use crate::core::{Result, Value};
use crate::result::ResultSet;
use config::ConnectionConfig;

/// A physical database connection.
///
/// Auto-commit follows the usual driver contract: while it is off, statements
/// accumulate in an open transaction until `commit` or `rollback`; switching
/// it back on commits pending work.
pub trait Connection: Send {
    /// Pool-assigned identity, stable for the life of the connection.
    fn id(&self) -> u64;

    fn auto_commit(&self) -> Result<bool>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Runs a query and materializes its rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs several parameterless statements, e.g. schema setup.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// `false` once the connection must not be handed out again.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Opens physical connections for a pool.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, id: u64, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}
