// ============================================================================
// Transaction Manager
// ============================================================================

use super::state::{ActiveScope, ScopeState, TransactionState};
use crate::connection::config::ConnectionConfig;
use crate::connection::pool::{ConnectionPool, PoolStats};
use crate::connection::sqlite::SqliteFactory;
use crate::connection::{Connection, ConnectionFactory};
use crate::core::{OrmError, Result, Value};
use crate::mapper::{FirstRow, ResultHandler, ResultMapper};
use crate::model::Model;
use std::sync::Arc;

/// Entry point to the data layer: owns the pool and hands out sessions.
///
/// Connections are only reachable through a [`Session`], so every request
/// made while a transaction is open goes through the scope that owns its
/// connection. Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct DaoManager {
    pool: Arc<ConnectionPool>,
}

impl DaoManager {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_config(config: ConnectionConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        Ok(Self::new(ConnectionPool::new(config, factory)?))
    }

    /// Pool of SQLite connections on `config.database`.
    pub fn sqlite(config: ConnectionConfig) -> Result<Self> {
        Self::from_config(config, Arc::new(SqliteFactory))
    }

    /// A fresh, idle session. One per request; never share it between threads.
    pub fn session(&self) -> Session {
        Session {
            pool: Arc::clone(&self.pool),
            state: TransactionState::Idle,
        }
    }

    /// Connections currently leased from the pool.
    pub fn num_active(&self) -> usize {
        self.pool.num_active()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Per-request transaction scope.
///
/// While a transaction is open every request made through the session,
/// transactional or not, uses the one connection leased on entry. Dropping
/// a session with an open transaction rolls it back.
pub struct Session {
    pool: Arc<ConnectionPool>,
    state: TransactionState,
}

impl Session {
    /// Runs `body` inside a transaction.
    ///
    /// The outermost call leases a connection and turns auto-commit off;
    /// nested calls join it. When the outermost body returns, the work is
    /// committed on `Ok` and rolled back on `Err`, auto-commit is restored
    /// and the connection goes back to the pool. Errors from `body` are
    /// returned unchanged.
    ///
    /// A nested body that fails marks the whole transaction rollback-only:
    /// the outermost scope then rolls back even if the error was swallowed
    /// in between, and reports [`OrmError::Transaction`].
    pub fn run_in_transaction<T, E, F>(&mut self, body: F) -> std::result::Result<T, E>
    where
        E: From<OrmError>,
        F: FnOnce(&mut Session) -> std::result::Result<T, E>,
    {
        self.enter()?;
        let outcome = body(self);
        self.exit(outcome)
    }

    /// Runs `body` on the transaction's connection, or on a short-lived
    /// lease when no transaction is open.
    pub fn with_connection<T, E, F>(&mut self, body: F) -> std::result::Result<T, E>
    where
        E: From<OrmError>,
        F: FnOnce(&mut dyn Connection) -> std::result::Result<T, E>,
    {
        match &mut self.state {
            TransactionState::Active(scope) => body(scope.lease.connection()),
            TransactionState::Idle => {
                let mut lease = self.pool.get_connection()?;
                body(lease.connection())
            }
        }
    }

    /// Runs a query and maps every row onto an `M`.
    pub fn query<M: Model>(&mut self, sql: &str, params: &[Value]) -> Result<Vec<M>> {
        self.query_with(sql, params, &ResultMapper::<M>::new())
    }

    /// Runs a query and maps only its first row.
    pub fn query_first<M: Model>(&mut self, sql: &str, params: &[Value]) -> Result<Option<M>> {
        self.query_with(sql, params, &FirstRow::<M>::new())
    }

    pub fn query_with<H: ResultHandler>(
        &mut self,
        sql: &str,
        params: &[Value],
        handler: &H,
    ) -> Result<H::Output> {
        self.with_connection(|conn| {
            let rs = conn.query(sql, params)?;
            handler.handle(&rs)
        })
    }

    /// Runs a statement and returns the number of affected rows.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.with_connection(|conn| conn.execute(sql, params))
    }

    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.with_connection(|conn| conn.execute_batch(sql))
    }

    pub fn state(&self) -> ScopeState {
        self.state.view()
    }

    pub fn depth(&self) -> usize {
        self.state().depth()
    }

    pub fn in_transaction(&self) -> bool {
        self.state().is_active()
    }

    /// Identity of the connection held by the open transaction.
    pub fn connection_id(&self) -> Option<u64> {
        match &self.state {
            TransactionState::Active(scope) => Some(scope.lease.id()),
            TransactionState::Idle => None,
        }
    }

    fn enter(&mut self) -> Result<()> {
        if let TransactionState::Active(scope) = &mut self.state {
            scope.depth += 1;
            tracing::debug!(depth = scope.depth, "joined transaction");
            return Ok(());
        }

        let mut lease = self.pool.get_connection()?;
        let conn = lease.connection();
        let saved_auto_commit = conn.auto_commit()?;
        conn.set_auto_commit(false)?;

        tracing::debug!(connection = lease.id(), "began transaction");
        self.state = TransactionState::Active(ActiveScope {
            lease,
            depth: 1,
            saved_auto_commit,
            rollback_only: false,
        });
        Ok(())
    }

    fn exit<T, E: From<OrmError>>(
        &mut self,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let TransactionState::Active(scope) = &mut self.state else {
            return Err(OrmError::Transaction("no transaction to leave".into()).into());
        };

        if outcome.is_err() {
            scope.rollback_only = true;
        }
        if scope.depth > 1 {
            scope.depth -= 1;
            return outcome;
        }

        let TransactionState::Active(scope) = std::mem::replace(&mut self.state, TransactionState::Idle)
        else {
            return outcome;
        };
        let rollback_only = scope.rollback_only;

        match outcome {
            Ok(value) if !rollback_only => {
                scope.finish(true)?;
                Ok(value)
            }
            Ok(_) => {
                scope.finish(false)?;
                Err(OrmError::Transaction(
                    "rolled back: a nested scope failed".into(),
                )
                .into())
            }
            Err(err) => {
                if let Err(cleanup) = scope.finish(false) {
                    tracing::warn!(error = %cleanup, "rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let TransactionState::Active(scope) = std::mem::replace(&mut self.state, TransactionState::Idle) {
            tracing::warn!(depth = scope.depth, "session dropped inside a transaction; rolling back");
            if let Err(err) = scope.finish(false) {
                tracing::warn!(error = %err, "rollback on drop failed");
            }
        }
    }
}
