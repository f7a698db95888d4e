//! Stored procedure invocation.
//!
//! A [`PreparedCall`] owns one [`ProcedureCall`] on a borrowed connection.
//! Cursors are handed out as [`Cursor`]s that borrow the call mutably, so a
//! cursor can never outlive the statement that produced it and only one can
//! be open at a time.

use crate::db::connection::ProcedureConnection;
use crate::db::types::ResultRow;
use crate::error::{DbError, DbResult};
use crate::models::{ProcedureCall, SqlValue};

/// A validated call bound to a connection.
pub struct PreparedCall<'c> {
    conn: &'c mut dyn ProcedureConnection,
    call: ProcedureCall,
    executed: bool,
    cursor_open: bool,
}

impl std::fmt::Debug for PreparedCall<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedCall")
            .field("call", &self.call)
            .field("executed", &self.executed)
            .field("cursor_open", &self.cursor_open)
            .finish_non_exhaustive()
    }
}

impl<'c> PreparedCall<'c> {
    /// Validate `call` and bind it to `conn`. Nothing is sent yet.
    pub fn prepare(conn: &'c mut dyn ProcedureConnection, call: ProcedureCall) -> DbResult<Self> {
        call.validate()?;
        Ok(Self {
            conn,
            call,
            executed: false,
            cursor_open: false,
        })
    }

    pub fn call(&self) -> &ProcedureCall {
        &self.call
    }

    /// Run the call. Returns `true` when a result cursor is available.
    pub async fn execute(&mut self) -> DbResult<bool> {
        self.cursor_open = false;
        let has_cursor = self.conn.execute(&self.call).await?;
        self.executed = true;
        self.cursor_open = has_cursor;
        Ok(has_cursor)
    }

    /// The current cursor, if the last step produced one.
    pub fn result_set(&mut self) -> Option<Cursor<'_, 'c>> {
        if self.cursor_open {
            Some(Cursor { call: self })
        } else {
            None
        }
    }

    /// Advance to the next cursor, closing the current one first.
    pub async fn more_results(&mut self) -> DbResult<bool> {
        self.ensure_executed()?;
        if self.cursor_open {
            self.cursor_open = false;
            self.conn.close_cursor().await?;
        }
        let has_cursor = self.conn.more_results().await?;
        self.cursor_open = has_cursor;
        Ok(has_cursor)
    }

    /// Value of a declared output parameter.
    pub async fn output(&mut self, position: usize) -> DbResult<SqlValue> {
        self.ensure_executed()?;
        if !self.call.declares_output(position) {
            return Err(DbError::protocol(
                format!("position {} is not a declared output", position),
                self.call.name(),
            ));
        }
        self.conn.output(position).await
    }

    /// Integer output flag. NULL reads as 0.
    pub async fn output_flag(&mut self, position: usize) -> DbResult<i64> {
        let value = self.output(position).await?;
        if value.is_null() {
            return Ok(0);
        }
        value.as_i64().ok_or_else(|| {
            DbError::protocol(
                format!(
                    "output {} holds {} where an integer was expected",
                    position,
                    value.type_name()
                ),
                self.call.name(),
            )
        })
    }

    /// Close any open cursor, then the statement.
    pub async fn close(mut self) -> DbResult<()> {
        if self.cursor_open {
            self.cursor_open = false;
            self.conn.close_cursor().await?;
        }
        self.conn.close_statement().await
    }

    fn ensure_executed(&self) -> DbResult<()> {
        if self.executed {
            Ok(())
        } else {
            Err(DbError::protocol(
                "the call has not been executed",
                self.call.name(),
            ))
        }
    }
}

/// Forward-only reader over one result set.
pub struct Cursor<'p, 'c> {
    call: &'p mut PreparedCall<'c>,
}

impl Cursor<'_, '_> {
    pub async fn next_row(&mut self) -> DbResult<Option<ResultRow>> {
        self.call.conn.next_row().await
    }

    pub async fn close(self) -> DbResult<()> {
        self.call.cursor_open = false;
        self.call.conn.close_cursor().await
    }
}
