//! Connection seams consumed by the gateway core.
//!
//! [`ConnectionPool`] hands out exclusive connections; [`ProcedureConnection`]
//! is the per-connection protocol for one prepared call at a time: execute,
//! walk result cursors in order, read outputs, run batches, and control the
//! commit mode.
//!
//! Implementations hold at most one open statement and one open cursor.
//! `close_cursor` and `close_statement` are idempotent. A connection that
//! reports `in_transaction` must be rolled back and put back into autocommit
//! before it is released, or discarded.

use crate::db::types::ResultRow;
use crate::error::DbResult;
use crate::models::{ProcedureCall, SqlValue};
use async_trait::async_trait;

#[async_trait]
pub trait ProcedureConnection: Send {
    /// Prepare, bind and execute `call`, replacing any previous statement.
    ///
    /// Returns `true` when a result cursor is available.
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<bool>;

    /// Next row of the current cursor, `None` once it is drained.
    async fn next_row(&mut self) -> DbResult<Option<ResultRow>>;

    /// Close the current cursor, if one is open.
    async fn close_cursor(&mut self) -> DbResult<()>;

    /// Advance to the next cursor of the executed statement.
    ///
    /// Returns `false` when the statement produced no further cursor.
    async fn more_results(&mut self) -> DbResult<bool>;

    /// Value of the output parameter at `position` of the executed statement.
    async fn output(&mut self, position: usize) -> DbResult<SqlValue>;

    /// Execute every call of `batch` as one unit against the same procedure.
    ///
    /// Returns the total number of affected rows.
    async fn execute_batch(&mut self, batch: &[ProcedureCall]) -> DbResult<u64>;

    /// Close the current statement, if one is open.
    async fn close_statement(&mut self) -> DbResult<()>;

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    /// Whether autocommit was switched off and has not been restored since.
    fn in_transaction(&self) -> bool;

    /// Close the physical connection on release instead of reusing it.
    fn discard(&mut self);
}

/// Source of exclusive connections.
///
/// Every connection returned by `acquire` must be handed back to `release`
/// exactly once.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Wait for a free connection.
    async fn acquire(&self) -> DbResult<Box<dyn ProcedureConnection>>;

    /// Return a connection to the pool.
    async fn release(&self, connection: Box<dyn ProcedureConnection>);
}
