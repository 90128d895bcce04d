use super::{Connection, ConnectionFactory, config::ConnectionConfig};
use crate::core::{OrmError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Connection pool
///
/// Leases connections to callers and takes them back when the lease guard
/// drops. Leasing and returning are safe from any number of threads; a caller
/// that finds the pool exhausted waits up to `connect_timeout` for a return.
pub struct ConnectionPool {
    config: ConnectionConfig,
    factory: Arc<dyn ConnectionFactory>,
    shared: Arc<PoolShared>,
}

/// State shared between the pool and its outstanding guards
struct PoolShared {
    idle: Mutex<VecDeque<PooledConnection>>,
    returned: Condvar,
    /// Open physical connections, idle or leased
    total: AtomicUsize,
    /// Connections currently leased
    active: AtomicUsize,
    next_id: AtomicU64,
}

/// A connection from the pool
struct PooledConnection {
    connection: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Box<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }

    fn refresh_last_used(&mut self) {
        self.last_used = Instant::now();
    }
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            config,
            factory,
            shared: Arc::new(PoolShared {
                idle: Mutex::new(VecDeque::new()),
                returned: Condvar::new(),
                total: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        };

        pool.ensure_min_connections()?;
        Ok(pool)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<PoolGuard> {
        let deadline = Instant::now() + self.config.connect_timeout;
        let mut idle = self.shared.idle.lock()?;

        loop {
            self.evict_stale(&mut idle);

            if let Some(mut pooled) = idle.pop_front() {
                drop(idle);
                pooled.refresh_last_used();
                return Ok(self.lease(pooled));
            }

            // Slots are only reserved under the idle lock, so the check and the
            // increment cannot interleave with another reservation.
            if self.shared.total.load(Ordering::SeqCst) < self.config.max_connections {
                self.shared.total.fetch_add(1, Ordering::SeqCst);
                drop(idle);
                return self.open_reserved().map(|pooled| self.lease(pooled));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    max_connections = self.config.max_connections,
                    "connection pool exhausted"
                );
                return Err(OrmError::PoolTimeout(self.config.connect_timeout));
            }

            let (guard, _) = self.shared.returned.wait_timeout(idle, deadline - now)?;
            idle = guard;
        }
    }

    fn lease(&self, pooled: PooledConnection) -> PoolGuard {
        self.shared.active.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection = pooled.connection.id(), "leased connection");
        PoolGuard {
            pooled: Some(pooled),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Opens a connection for a slot already counted in `total`.
    fn open_reserved(&self) -> Result<PooledConnection> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        match self.factory.connect(id, &self.config) {
            Ok(connection) => {
                tracing::debug!(connection = id, database = %self.config.database, "opened connection");
                Ok(PooledConnection::new(connection))
            }
            Err(err) => {
                self.shared.total.fetch_sub(1, Ordering::SeqCst);
                self.shared.returned.notify_one();
                Err(err)
            }
        }
    }

    fn evict_stale(&self, idle: &mut MutexGuard<'_, VecDeque<PooledConnection>>) {
        let before = idle.len();
        idle.retain(|pooled| {
            !(pooled.is_expired(self.config.max_lifetime)
                || pooled.is_idle_too_long(self.config.idle_timeout))
        });

        let removed = before - idle.len();
        if removed > 0 {
            self.shared.total.fetch_sub(removed, Ordering::SeqCst);
            tracing::debug!(removed, "evicted stale connections");
        }
    }

    fn ensure_min_connections(&self) -> Result<()> {
        while self.shared.total.load(Ordering::SeqCst) < self.config.min_connections {
            self.shared.total.fetch_add(1, Ordering::SeqCst);
            let pooled = self.open_reserved()?;
            self.shared.idle.lock()?.push_back(pooled);
        }
        Ok(())
    }

    /// Number of connections currently leased.
    pub fn num_active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self
            .shared
            .idle
            .lock()
            .map(|idle| idle.len())
            .unwrap_or_default();

        PoolStats {
            total_connections: self.shared.total.load(Ordering::SeqCst),
            idle_connections: idle,
            active_connections: self.num_active(),
            max_connections: self.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub idle_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} idle, max {}",
            self.active_connections,
            self.total_connections,
            self.idle_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped. A connection left with
/// auto-commit off is rolled back and switched back to auto-commit first;
/// one that cannot be reset is closed instead of being reused.
pub struct PoolGuard {
    pooled: Option<PooledConnection>,
    shared: Arc<PoolShared>,
}

impl PoolGuard {
    pub fn connection(&mut self) -> &mut dyn Connection {
        self.pooled
            .as_mut()
            .map(|pooled| pooled.connection.as_mut())
            .expect("Connection already returned to pool")
    }

    pub fn id(&self) -> u64 {
        self.pooled
            .as_ref()
            .map(|pooled| pooled.connection.id())
            .unwrap_or_default()
    }
}

fn reset(connection: &mut dyn Connection) -> Result<()> {
    if !connection.auto_commit()? {
        tracing::warn!(
            connection = connection.id(),
            "connection returned with auto-commit off; rolling back"
        );
        connection.rollback()?;
        connection.set_auto_commit(true)?;
    }
    Ok(())
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let Some(mut pooled) = self.pooled.take() else {
            return;
        };

        let reusable = match reset(pooled.connection.as_mut()) {
            Ok(()) => pooled.connection.is_valid(),
            Err(err) => {
                tracing::warn!(connection = pooled.connection.id(), error = %err, "closing connection that failed to reset");
                false
            }
        };

        // Released before the connection becomes visible in `idle`, so a
        // waiter that picks it up never observes more than max active.
        self.shared.active.fetch_sub(1, Ordering::SeqCst);

        if reusable {
            pooled.refresh_last_used();
            match self.shared.idle.lock() {
                Ok(mut idle) => idle.push_back(pooled),
                Err(_) => {
                    self.shared.total.fetch_sub(1, Ordering::SeqCst);
                }
            }
        } else {
            self.shared.total.fetch_sub(1, Ordering::SeqCst);
        }

        self.shared.returned.notify_one();
    }
}
