//! Scripted in-memory pool shared by the integration tests.
//!
//! Each procedure name maps to a [`Script`] describing the result sets and
//! output values a call returns. The pool records every protocol step as an
//! [`Event`] so tests can check acquire/release balance, release ordering,
//! and which batch rows were committed.

#![allow(dead_code)]

use async_trait::async_trait;
use clinic_registry_gateway::db::{ConnectionPool, ProcedureConnection, ResultRow};
use clinic_registry_gateway::error::{DbError, DbResult};
use clinic_registry_gateway::models::{ProcedureCall, SqlValue};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Canned response of one procedure.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub result_sets: Vec<Vec<ResultRow>>,
    pub outputs: HashMap<usize, SqlValue>,
    pub fail_execute: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result_set(mut self, rows: Vec<ResultRow>) -> Self {
        self.result_sets.push(rows);
        self
    }

    pub fn output(mut self, position: usize, value: impl Into<SqlValue>) -> Self {
        self.outputs.insert(position, value.into());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_execute: true,
            ..Self::default()
        }
    }
}

/// One protocol step, tagged with the connection it happened on.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Acquire(usize),
    Execute(usize, String),
    CloseCursor(usize),
    CloseStatement(usize),
    Batch(usize, usize),
    SetAutoCommit(usize, bool),
    Commit(usize),
    Rollback(usize),
    Discard(usize),
    Release(usize),
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    events: Vec<Event>,
    next_id: usize,
    acquired: usize,
    released: usize,
    fail_acquire: bool,
    /// 1-based batch element that fails.
    fail_batch_at: Option<usize>,
    fail_commit: bool,
    fail_rollback: bool,
    /// Pause after staging each batch element.
    batch_delay: Option<Duration>,
    executed: Vec<ProcedureCall>,
    committed: Vec<ProcedureCall>,
}

#[derive(Clone, Default)]
pub struct ScriptedPool {
    state: Arc<Mutex<State>>,
}

impl ScriptedPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn script(&self, procedure: &str, script: Script) -> &Self {
        self.lock().scripts.insert(procedure.to_string(), script);
        self
    }

    pub fn fail_acquire(&self) -> &Self {
        self.lock().fail_acquire = true;
        self
    }

    pub fn fail_batch_at(&self, element: usize) -> &Self {
        self.lock().fail_batch_at = Some(element);
        self
    }

    pub fn fail_commit(&self) -> &Self {
        self.lock().fail_commit = true;
        self
    }

    pub fn fail_rollback(&self) -> &Self {
        self.lock().fail_rollback = true;
        self
    }

    pub fn slow_batch(&self, delay: Duration) -> &Self {
        self.lock().batch_delay = Some(delay);
        self
    }

    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    pub fn released(&self) -> usize {
        self.lock().released
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn committed(&self) -> Vec<ProcedureCall> {
        self.lock().committed.clone()
    }

    /// Every call passed to `execute`, in order.
    pub fn executed(&self) -> Vec<ProcedureCall> {
        self.lock().executed.clone()
    }

    /// Wait for spawned release tasks to hand every connection back.
    pub async fn settle(&self) {
        for _ in 0..100 {
            if self.released() == self.acquired() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn as_pool(&self) -> Arc<dyn ConnectionPool> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ConnectionPool for ScriptedPool {
    async fn acquire(&self) -> DbResult<Box<dyn ProcedureConnection>> {
        let mut state = self.lock();
        if state.fail_acquire {
            return Err(DbError::connection(
                "pool exhausted",
                "Retry once connections are free",
            ));
        }
        state.next_id += 1;
        state.acquired += 1;
        let id = state.next_id;
        state.events.push(Event::Acquire(id));
        Ok(Box::new(ScriptedConnection {
            id,
            state: Arc::clone(&self.state),
            pending: VecDeque::new(),
            cursor: None,
            outputs: HashMap::new(),
            staged: Vec::new(),
            auto_commit: true,
        }))
    }

    async fn release(&self, connection: Box<dyn ProcedureConnection>) {
        self.lock().released += 1;
        // The connection records its own Release event when dropped
        drop(connection);
    }
}

struct ScriptedConnection {
    id: usize,
    state: Arc<Mutex<State>>,
    pending: VecDeque<Vec<ResultRow>>,
    cursor: Option<VecDeque<ResultRow>>,
    outputs: HashMap<usize, SqlValue>,
    staged: Vec<ProcedureCall>,
    auto_commit: bool,
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.record(Event::Release(self.id));
    }
}

impl ScriptedConnection {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, event: Event) {
        self.lock().events.push(event);
    }
}

#[async_trait]
impl ProcedureConnection for ScriptedConnection {
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<bool> {
        self.record(Event::Execute(self.id, call.name().to_string()));
        self.lock().executed.push(call.clone());
        let script = self.lock().scripts.get(call.name()).cloned();
        let script = script.ok_or_else(|| {
            DbError::database(
                format!("PROCEDURE {} does not exist", call.name()),
                Some("42000".to_string()),
                "Check the procedure name",
            )
        })?;
        if script.fail_execute {
            return Err(DbError::database(
                format!("{} raised an error", call.name()),
                Some("45000".to_string()),
                "Check the procedure body",
            ));
        }
        self.pending = script.result_sets.into();
        self.cursor = self.pending.pop_front().map(VecDeque::from);
        self.outputs = script.outputs;
        Ok(self.cursor.is_some())
    }

    async fn next_row(&mut self) -> DbResult<Option<ResultRow>> {
        match self.cursor.as_mut() {
            Some(rows) => Ok(rows.pop_front()),
            None => Err(DbError::protocol("no open cursor", "scripted")),
        }
    }

    async fn close_cursor(&mut self) -> DbResult<()> {
        self.cursor = None;
        self.record(Event::CloseCursor(self.id));
        Ok(())
    }

    async fn more_results(&mut self) -> DbResult<bool> {
        self.cursor = self.pending.pop_front().map(VecDeque::from);
        Ok(self.cursor.is_some())
    }

    async fn output(&mut self, position: usize) -> DbResult<SqlValue> {
        Ok(self
            .outputs
            .get(&position)
            .cloned()
            .unwrap_or(SqlValue::Null))
    }

    async fn execute_batch(&mut self, batch: &[ProcedureCall]) -> DbResult<u64> {
        self.record(Event::Batch(self.id, batch.len()));
        let fail_at = self.lock().fail_batch_at;
        let delay = self.lock().batch_delay;
        for (idx, call) in batch.iter().enumerate() {
            if fail_at == Some(idx + 1) {
                return Err(DbError::database(
                    format!("batch element {} rejected", idx + 1),
                    Some("23000".to_string()),
                    "Check the batch values",
                ));
            }
            if self.auto_commit {
                self.lock().committed.push(call.clone());
            } else {
                self.staged.push(call.clone());
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(batch.len() as u64)
    }

    async fn close_statement(&mut self) -> DbResult<()> {
        self.pending.clear();
        self.outputs.clear();
        self.record(Event::CloseStatement(self.id));
        Ok(())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()> {
        self.auto_commit = enabled;
        self.record(Event::SetAutoCommit(self.id, enabled));
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.record(Event::Commit(self.id));
        if self.lock().fail_commit {
            return Err(DbError::database("commit refused", None, "Retry the write"));
        }
        let staged = std::mem::take(&mut self.staged);
        self.lock().committed.extend(staged);
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.record(Event::Rollback(self.id));
        self.staged.clear();
        if self.lock().fail_rollback {
            return Err(DbError::connection("connection lost", "Reconnect"));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.auto_commit
    }

    fn discard(&mut self) {
        self.record(Event::Discard(self.id));
    }
}
