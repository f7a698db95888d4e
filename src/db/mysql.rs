//! MySQL implementation of the procedure call protocol.
//!
//! A call is sent as `CALL name(?, …, @out_N)`. Every result set the
//! procedure produces is read with `fetch_many` and buffered, split at each
//! completion marker; the marker that closes the `CALL` itself carries no
//! cursor and is dropped. Output parameters land in session variables and
//! are read back with a single `SELECT` once the call has completed.

use crate::db::connection::ProcedureConnection;
use crate::db::params::{bind_inputs, call_sql, output_column, outputs_sql};
use crate::db::types::{ResultRow, column_labels, decode_mysql_row};
use crate::error::{DbError, DbResult};
use crate::models::{ProcedureCall, SqlValue};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::{Either, Executor, MySql, MySqlConnection};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// State of the executed statement on a connection.
struct OpenStatement {
    procedure: String,
    declared_outputs: Vec<usize>,
    /// Cursors not yet reached, in server order.
    pending: VecDeque<Vec<ResultRow>>,
    cursor: Option<std::vec::IntoIter<ResultRow>>,
    outputs: HashMap<usize, SqlValue>,
}

/// A pooled MySQL connection speaking the procedure protocol.
pub struct MySqlProcedureConnection {
    conn: PoolConnection<MySql>,
    statement: Option<OpenStatement>,
    query_timeout: Duration,
    /// Set once `SET autocommit = 0` is sent, cleared once `= 1` succeeds.
    in_transaction: bool,
}

impl MySqlProcedureConnection {
    pub fn new(conn: PoolConnection<MySql>, query_timeout: Duration) -> Self {
        Self {
            conn,
            statement: None,
            query_timeout,
            in_transaction: false,
        }
    }

    fn open_statement(&mut self) -> DbResult<&mut OpenStatement> {
        self.statement
            .as_mut()
            .ok_or_else(|| DbError::protocol("no statement has been executed", "<none>"))
    }

    async fn run_raw(&mut self, sql: &'static str) -> DbResult<()> {
        let conn: &mut MySqlConnection = &mut self.conn;
        with_timeout(self.query_timeout, sql, async {
            Executor::execute(conn, sql)
                .await
                .map(|_| ())
                .map_err(DbError::from)
        })
        .await
    }
}

async fn with_timeout<T>(
    query_timeout: Duration,
    operation: &str,
    fut: impl Future<Output = DbResult<T>>,
) -> DbResult<T> {
    match timeout(query_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::timeout(operation, query_timeout.as_secs() as u32)),
    }
}

/// Run a `CALL` and buffer every result set it produces.
async fn fetch_result_sets(
    conn: &mut MySqlConnection,
    sql: &str,
    call: &ProcedureCall,
) -> DbResult<Vec<Vec<ResultRow>>> {
    let query = bind_inputs(sqlx::query(sql), call);
    let mut stream = conn.fetch_many(query);

    let mut sets = Vec::new();
    let mut current = Vec::new();
    let mut columns: Option<Arc<[String]>> = None;

    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(_) => {
                sets.push(std::mem::take(&mut current));
                columns = None;
            }
            Either::Right(row) => {
                let labels = columns.get_or_insert_with(|| column_labels(&row));
                current.push(decode_mysql_row(&row, labels)?);
            }
        }
    }
    if !current.is_empty() {
        sets.push(current);
    }
    // Completion marker of the CALL statement itself
    if sets.last().is_some_and(Vec::is_empty) {
        sets.pop();
    }
    Ok(sets)
}

/// Read back the session variables holding the call's outputs.
async fn fetch_outputs(
    conn: &mut MySqlConnection,
    call: &ProcedureCall,
) -> DbResult<HashMap<usize, SqlValue>> {
    let Some(sql) = outputs_sql(call) else {
        return Ok(HashMap::new());
    };
    let row = conn.fetch_one(sql.as_str()).await?;
    let decoded = decode_mysql_row(&row, &column_labels(&row))?;

    call.outputs()
        .iter()
        .map(|out| {
            decoded
                .get(&output_column(out.position))
                .map(|v| (out.position, v.clone()))
        })
        .collect()
}

#[async_trait]
impl ProcedureConnection for MySqlProcedureConnection {
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<bool> {
        call.validate()?;
        self.statement = None;

        let sql = call_sql(call);
        debug!(
            procedure = %call.name(),
            sql = %sql,
            inputs = call.inputs().len(),
            outputs = call.outputs().len(),
            "Executing procedure call"
        );

        let conn: &mut MySqlConnection = &mut self.conn;
        let (sets, outputs) = with_timeout(
            self.query_timeout,
            &format!("CALL {}", call.name()),
            async {
                let sets = fetch_result_sets(&mut *conn, &sql, call).await?;
                let outputs = fetch_outputs(&mut *conn, call).await?;
                Ok::<_, DbError>((sets, outputs))
            },
        )
        .await?;

        debug!(
            procedure = %call.name(),
            cursors = sets.len(),
            "Procedure call completed"
        );

        let mut pending: VecDeque<_> = sets.into();
        let cursor = pending.pop_front().map(Vec::into_iter);
        let has_cursor = cursor.is_some();
        self.statement = Some(OpenStatement {
            procedure: call.name().to_string(),
            declared_outputs: call.outputs().iter().map(|o| o.position).collect(),
            pending,
            cursor,
            outputs,
        });
        Ok(has_cursor)
    }

    async fn next_row(&mut self) -> DbResult<Option<ResultRow>> {
        let statement = self.open_statement()?;
        match statement.cursor.as_mut() {
            Some(rows) => Ok(rows.next()),
            None => Err(DbError::protocol(
                "no open cursor",
                statement.procedure.clone(),
            )),
        }
    }

    async fn close_cursor(&mut self) -> DbResult<()> {
        if let Some(statement) = self.statement.as_mut() {
            statement.cursor = None;
        }
        Ok(())
    }

    async fn more_results(&mut self) -> DbResult<bool> {
        let statement = self.open_statement()?;
        statement.cursor = statement.pending.pop_front().map(Vec::into_iter);
        Ok(statement.cursor.is_some())
    }

    async fn output(&mut self, position: usize) -> DbResult<SqlValue> {
        let statement = self.open_statement()?;
        if !statement.declared_outputs.contains(&position) {
            return Err(DbError::protocol(
                format!("output {} was not declared", position),
                statement.procedure.clone(),
            ));
        }
        Ok(statement
            .outputs
            .get(&position)
            .cloned()
            .unwrap_or(SqlValue::Null))
    }

    async fn execute_batch(&mut self, batch: &[ProcedureCall]) -> DbResult<u64> {
        self.statement = None;
        let Some(first) = batch.first() else {
            return Ok(0);
        };

        let mut rows_affected = 0;
        for call in batch {
            call.validate()?;
            if call.name() != first.name() || !call.outputs().is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Batch against {} must repeat the same procedure without outputs",
                    first.name()
                )));
            }
            let sql = call_sql(call);
            let conn: &mut MySqlConnection = &mut self.conn;
            let result = with_timeout(
                self.query_timeout,
                &format!("CALL {}", call.name()),
                async {
                    bind_inputs(sqlx::query(&sql), call)
                        .execute(conn)
                        .await
                        .map_err(DbError::from)
                },
            )
            .await?;
            rows_affected += result.rows_affected();
        }

        debug!(
            procedure = %first.name(),
            batch_size = batch.len(),
            rows_affected,
            "Batch executed"
        );
        Ok(rows_affected)
    }

    async fn close_statement(&mut self) -> DbResult<()> {
        self.statement = None;
        Ok(())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()> {
        if !enabled {
            // Counts as open even when the statement is interrupted
            self.in_transaction = true;
            return self.run_raw("SET autocommit = 0").await;
        }
        self.run_raw("SET autocommit = 1").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run_raw("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.run_raw("ROLLBACK").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn discard(&mut self) {
        self.conn.close_on_drop();
    }
}
