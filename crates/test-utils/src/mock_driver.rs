// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock driver implementation for testing
//!
//! Provides an in-memory driver with builder pattern for easy test setup.
//! Every call is appended to a shared journal so tests can verify what
//! reached the underlying driver.

use std::sync::Arc;

use isutrace_driver::{
    Connection, Driver, DriverError, DriverResult, ExecResult, NamedValue, Rows, Statement, Value,
};
use parking_lot::Mutex;

/// A call observed by the mock driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open(String),
    Exec(String),
    Query(String),
    FastPathSkipped(String),
    Prepare(String),
    StatementExec(String),
    StatementQuery(String),
    StatementClose(String),
    Ping,
    Begin,
    Commit,
    Rollback,
    Close,
}

type CallHook = Arc<dyn Fn(&str) + Send + Sync>;

struct MockState {
    journal: Mutex<Vec<MockCall>>,
    skip_fast_path: bool,
    skip_prepare: bool,
    fail_open: bool,
    exec_outcome: DriverResult<ExecResult>,
    query_outcome: DriverResult<Rows>,
    on_call: Option<CallHook>,
}

impl MockState {
    fn record(&self, call: MockCall) {
        self.journal.lock().push(call);
    }

    fn run_hook(&self, query: &str) {
        if let Some(hook) = &self.on_call {
            hook(query);
        }
    }
}

/// In-memory mock driver for testing
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        MockDriverBuilder::new().build()
    }
}

impl MockDriver {
    /// Create a driver that succeeds on every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a scripted driver
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Snapshot of every call seen so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.journal.lock().clone()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.state.journal.lock().clear();
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("skip_fast_path", &self.state.skip_fast_path)
            .field("calls", &self.calls().len())
            .finish()
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn open(&self, dsn: &str) -> DriverResult<Box<dyn Connection>> {
        self.state.record(MockCall::Open(dsn.to_string()));
        if self.state.fail_open {
            return Err(DriverError::Connection(format!("mock refused dsn '{dsn}'")));
        }
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn exec(&mut self, query: &str, _args: &[NamedValue]) -> DriverResult<ExecResult> {
        if self.state.skip_fast_path {
            self.state.record(MockCall::FastPathSkipped(query.to_string()));
            return Err(DriverError::Skip);
        }
        self.state.run_hook(query);
        self.state.record(MockCall::Exec(query.to_string()));
        self.state.exec_outcome.clone()
    }

    async fn query(&mut self, query: &str, _args: &[NamedValue]) -> DriverResult<Rows> {
        if self.state.skip_fast_path {
            self.state.record(MockCall::FastPathSkipped(query.to_string()));
            return Err(DriverError::Skip);
        }
        self.state.run_hook(query);
        self.state.record(MockCall::Query(query.to_string()));
        self.state.query_outcome.clone()
    }

    async fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Statement>> {
        self.state.record(MockCall::Prepare(query.to_string()));
        if self.state.skip_prepare {
            return Err(DriverError::Skip);
        }
        Ok(Box::new(MockStatement {
            query: query.to_string(),
            state: self.state.clone(),
        }))
    }

    async fn ping(&mut self) -> DriverResult<()> {
        self.state.record(MockCall::Ping);
        Ok(())
    }

    async fn begin(&mut self) -> DriverResult<()> {
        self.state.record(MockCall::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.state.record(MockCall::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.state.record(MockCall::Rollback);
        Ok(())
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.state.record(MockCall::Close);
        Ok(())
    }
}

struct MockStatement {
    query: String,
    state: Arc<MockState>,
}

#[async_trait::async_trait]
impl Statement for MockStatement {
    fn query_text(&self) -> &str {
        &self.query
    }

    async fn exec(&mut self, _args: &[NamedValue]) -> DriverResult<ExecResult> {
        self.state.run_hook(&self.query);
        self.state.record(MockCall::StatementExec(self.query.clone()));
        self.state.exec_outcome.clone()
    }

    async fn query(&mut self, _args: &[NamedValue]) -> DriverResult<Rows> {
        self.state.run_hook(&self.query);
        self.state.record(MockCall::StatementQuery(self.query.clone()));
        self.state.query_outcome.clone()
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.state.record(MockCall::StatementClose(self.query.clone()));
        Ok(())
    }
}

/// Builder for creating mock drivers with a fluent API
pub struct MockDriverBuilder {
    skip_fast_path: bool,
    skip_prepare: bool,
    fail_open: bool,
    exec_outcome: DriverResult<ExecResult>,
    query_outcome: DriverResult<Rows>,
    on_call: Option<CallHook>,
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriverBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            skip_fast_path: false,
            skip_prepare: false,
            fail_open: false,
            exec_outcome: Ok(ExecResult::new(1)),
            query_outcome: Ok(Rows::new(vec!["id".to_string()]).with_row(vec![Value::Int(1)])),
            on_call: None,
        }
    }

    /// Answer `DriverError::Skip` on the connection fast path
    pub fn skip_fast_path(mut self) -> Self {
        self.skip_fast_path = true;
        self
    }

    /// Answer `DriverError::Skip` from `prepare` as well
    pub fn skip_prepare(mut self) -> Self {
        self.skip_prepare = true;
        self
    }

    /// Refuse every `open`
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Outcome returned by every exec
    pub fn with_exec_outcome(mut self, outcome: DriverResult<ExecResult>) -> Self {
        self.exec_outcome = outcome;
        self
    }

    /// Outcome returned by every query
    pub fn with_query_outcome(mut self, outcome: DriverResult<Rows>) -> Self {
        self.query_outcome = outcome;
        self
    }

    /// Callback run while a statement "executes", before its outcome is returned
    pub fn with_call_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> MockDriver {
        MockDriver {
            state: Arc::new(MockState {
                journal: Mutex::new(Vec::new()),
                skip_fast_path: self.skip_fast_path,
                skip_prepare: self.skip_prepare,
                fail_open: self.fail_open,
                exec_outcome: self.exec_outcome,
                query_outcome: self.query_outcome,
                on_call: self.on_call,
            }),
        }
    }
}
