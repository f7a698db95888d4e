//! Scoped ownership of one pooled connection.
//!
//! A [`ConnectionLease`] is taken at the start of every gateway operation and
//! handed back with [`ConnectionLease::release`] on every exit path. Release
//! closes the open cursor, then the statement, rolls back a transaction the
//! operation left open, and only then returns the connection to the pool.

use crate::db::connection::{ConnectionPool, ProcedureConnection};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::{error, warn};

/// RAII guard for a pooled connection.
///
/// # Usage
///
/// ```ignore
/// let mut lease = ConnectionLease::acquire(&pool).await?;
/// let result = fetch(lease.connection()?).await;
/// lease.release().await;
/// ```
///
/// # Runtime Shutdown Behavior
///
/// The `Drop` implementation spawns a tokio task to run the release
/// sequence, so a cancelled operation still rolls back its transaction.
/// Outside a runtime, or while it shuts down, the connection is dropped
/// without being handed back, and discarded if a transaction is open.
/// Always call `release().await`.
pub struct ConnectionLease {
    connection: Option<Box<dyn ProcedureConnection>>,
    pool: Arc<dyn ConnectionPool>,
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("released", &self.connection.is_none())
            .finish_non_exhaustive()
    }
}

impl ConnectionLease {
    /// Wait for a connection from `pool`.
    pub async fn acquire(pool: &Arc<dyn ConnectionPool>) -> DbResult<Self> {
        let connection = pool.acquire().await?;
        Ok(Self {
            connection: Some(connection),
            pool: Arc::clone(pool),
        })
    }

    /// The leased connection.
    pub fn connection(&mut self) -> DbResult<&mut (dyn ProcedureConnection + 'static)> {
        match self.connection.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(DbError::internal("connection lease already released")),
        }
    }

    /// Close cursor and statement, reset the commit mode, then return the
    /// connection to the pool.
    pub async fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            close_and_release(connection, Arc::clone(&self.pool)).await;
        }
    }
}

async fn close_and_release(
    mut connection: Box<dyn ProcedureConnection>,
    pool: Arc<dyn ConnectionPool>,
) {
    if let Err(e) = connection.close_cursor().await {
        warn!(error = %e, "Failed to close result cursor");
    }
    if let Err(e) = connection.close_statement().await {
        warn!(error = %e, "Failed to close statement");
    }
    if connection.in_transaction() {
        warn!("Connection released inside a transaction, rolling back");
        if let Err(e) = abandon_transaction(connection.as_mut()).await {
            error!(error = %e, "Failed to reset connection, discarding it");
            connection.discard();
        }
    }
    pool.release(connection).await;
}

async fn abandon_transaction(connection: &mut dyn ProcedureConnection) -> DbResult<()> {
    connection.rollback().await?;
    connection.set_auto_commit(true).await
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                handle.spawn(async move {
                    close_and_release(connection, pool).await;
                    warn!("Connection released via Drop - consider using explicit release()");
                });
            }
            Err(_) => {
                if connection.in_transaction() {
                    connection.discard();
                }
                warn!("Connection lease dropped outside a runtime; connection not returned");
            }
        }
    }
}
