//! An in-memory [`crate::driver::Driver`] implementation used by this
//! crate's own unit tests, so the translator/statement/pool/rows logic can
//! be exercised without a real database. Scripted the way
//! `dbflux_test_support::fake_driver` builds its fake driver: a builder
//! that records expected SQL -> result mappings up front, then a shared
//! handle replays them.

use crate::driver::{ConnectionHandle, Driver, ExecResult, RowsHandle, StatementHandle, TxHandle};
use crate::error::{Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct FakeRowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Default)]
struct FakeState {
    query_results: Mutex<HashMap<String, VecDeque<FakeRowSet>>>,
    exec_results: Mutex<HashMap<String, u64>>,
    query_errors: Mutex<HashMap<String, String>>,
    exec_errors: Mutex<HashMap<String, String>>,
    open_calls: Mutex<usize>,
}

/// Builder for a scripted fake driver: `.with_query_result(sql, cols, rows)`
/// queues one result set to hand back the next time that exact SQL string
/// is queried; `.with_exec_result(sql, rows_affected)` does the same for
/// exec. SQL not registered falls back to an empty result (immediate
/// end-of-rows for queries, zero rows affected for exec) rather than an
/// error, so tests only need to script the calls they care about.
/// `.with_query_error`/`.with_exec_error` instead script a raw failure for
/// that exact SQL string, to exercise callers' driver-error handling.
#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        FakeDriver {
            state: Arc::new(FakeState::default()),
        }
    }

    pub fn with_query_result(self, sql: &str, columns: Vec<&str>, rows: Vec<Vec<Value>>) -> Self {
        self.state
            .query_results
            .lock()
            .unwrap()
            .entry(sql.to_string())
            .or_default()
            .push_back(FakeRowSet {
                columns: columns.into_iter().map(|c| c.to_string()).collect(),
                rows,
            });
        self
    }

    pub fn with_exec_result(self, sql: &str, rows_affected: u64) -> Self {
        self.state
            .exec_results
            .lock()
            .unwrap()
            .insert(sql.to_string(), rows_affected);
        self
    }

    pub fn with_query_error(self, sql: &str, message: &str) -> Self {
        self.state
            .query_errors
            .lock()
            .unwrap()
            .insert(sql.to_string(), message.to_string());
        self
    }

    pub fn with_exec_error(self, sql: &str, message: &str) -> Self {
        self.state
            .exec_errors
            .lock()
            .unwrap()
            .insert(sql.to_string(), message.to_string());
        self
    }

    pub fn open_calls(&self) -> usize {
        *self.state.open_calls.lock().unwrap()
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open(&self, _dsn: &str) -> Result<Box<dyn ConnectionHandle>> {
        *self.state.open_calls.lock().unwrap() += 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    state: Arc<FakeState>,
}

impl FakeConnection {
    fn take_query_result(&self, sql: &str) -> FakeRowSet {
        let mut results = self.state.query_results.lock().unwrap();
        match results.get_mut(sql).and_then(|q| q.pop_front()) {
            Some(set) => set,
            None => FakeRowSet {
                columns: Vec::new(),
                rows: Vec::new(),
            },
        }
    }

    fn exec_result(&self, sql: &str) -> u64 {
        *self.state.exec_results.lock().unwrap().get(sql).unwrap_or(&0)
    }

    fn query_error(&self, sql: &str) -> Option<String> {
        self.state.query_errors.lock().unwrap().get(sql).cloned()
    }

    fn exec_error(&self, sql: &str) -> Option<String> {
        self.state.exec_errors.lock().unwrap().get(sql).cloned()
    }
}

#[async_trait]
impl ConnectionHandle for FakeConnection {
    async fn prepare(&self, sql: &str) -> Result<Box<dyn StatementHandle>> {
        Ok(Box::new(FakeStatement {
            sql: sql.to_string(),
            state: self.state.clone(),
        }))
    }

    async fn exec(&self, sql: &str, _args: &[Value]) -> Result<Box<dyn ExecResult>> {
        if let Some(message) = self.exec_error(sql) {
            return Err(Error::programmer(message));
        }
        Ok(Box::new(FakeExecResult(self.exec_result(sql))))
    }

    async fn query(&self, sql: &str, _args: &[Value]) -> Result<Box<dyn RowsHandle>> {
        if let Some(message) = self.query_error(sql) {
            return Err(Error::programmer(message));
        }
        let set = self.take_query_result(sql);
        Ok(Box::new(FakeRows {
            columns: set.columns,
            rows: set.rows,
            pos: 0,
        }))
    }

    async fn begin(&self) -> Result<Box<dyn TxHandle>> {
        Ok(Box::new(FakeTx))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeStatement {
    sql: String,
    state: Arc<FakeState>,
}

#[async_trait]
impl StatementHandle for FakeStatement {
    async fn exec(&self, _args: &[Value]) -> Result<Box<dyn ExecResult>> {
        if let Some(message) = self.state.exec_errors.lock().unwrap().get(&self.sql).cloned() {
            return Err(Error::programmer(message));
        }
        let rows_affected = *self
            .state
            .exec_results
            .lock()
            .unwrap()
            .get(&self.sql)
            .unwrap_or(&0);
        Ok(Box::new(FakeExecResult(rows_affected)))
    }

    async fn query(&self, _args: &[Value]) -> Result<Box<dyn RowsHandle>> {
        if let Some(message) = self.state.query_errors.lock().unwrap().get(&self.sql).cloned() {
            return Err(Error::programmer(message));
        }
        let set = {
            let mut results = self.state.query_results.lock().unwrap();
            match results.get_mut(&self.sql).and_then(|q| q.pop_front()) {
                Some(set) => set,
                None => FakeRowSet {
                    columns: Vec::new(),
                    rows: Vec::new(),
                },
            }
        };
        Ok(Box::new(FakeRows {
            columns: set.columns,
            rows: set.rows,
            pos: 0,
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeRows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    pos: usize,
}

#[async_trait]
impl RowsHandle for FakeRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self, scratch: &mut [Value]) -> Result<()> {
        if self.pos >= self.rows.len() {
            return Err(Error::EndOfRows);
        }
        for (slot, value) in scratch.iter_mut().zip(self.rows[self.pos].iter()) {
            *slot = value.clone();
        }
        self.pos += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FakeTx;

#[async_trait]
impl TxHandle for FakeTx {
    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeExecResult(u64);

impl ExecResult for FakeExecResult {
    fn rows_affected(&self) -> u64 {
        self.0
    }
}
