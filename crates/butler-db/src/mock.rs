//! Scripted in-memory connector for tests.
//!
//! [`MockConnector`] hands out [`MockSession`]s that share one state block
//! with every clone of the connector, so a test keeps a clone as a probe:
//! it scripts outcomes, breaks the live session in various ways, and reads
//! back counters (connects, rollbacks, commits, closes) afterwards.
//!
//! Only the most recently opened session is live; any older session
//! reports itself closed and fails every operation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use butler_types::{Params, Row};

use crate::error::DbError;
use crate::params::bind_named;
use crate::session::{Connector, Session, TransactionStatus};

/// Outcome of the next statement a mock session executes.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Succeed with these rows (returned only when the request fetches).
    Rows(Vec<Row>),
    /// Succeed without rows.
    Ack,
    /// Fail as if the server connection dropped mid-statement.
    Connectivity(String),
    /// Fail as if the server rejected the statement.
    Statement(String),
}

/// A statement a mock session received.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// Statement text as sent.
    pub statement: String,
    /// Parameters as sent.
    pub params: Option<Params>,
    /// Whether rows were requested.
    pub fetch: bool,
}

#[derive(Debug, Default)]
struct MockState {
    target: String,
    next_id: u64,
    live: Option<u64>,
    live_status: Option<TransactionStatus>,
    live_closed: bool,
    severed: bool,
    fail_connects: usize,
    connects: usize,
    closes: usize,
    rollbacks: usize,
    commits: usize,
    script: VecDeque<Scripted>,
    executed: Vec<Executed>,
    targets: Vec<String>,
}

/// Connector producing scripted sessions. Clones share state.
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// A connector with a placeholder target.
    pub fn new() -> Self {
        Self::with_target("mock:5432/butler")
    }

    /// A connector reporting the given target.
    pub fn with_target(target: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                target: target.to_owned(),
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of a future statement.
    pub fn push(&self, outcome: Scripted) {
        self.lock().script.push_back(outcome);
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().fail_connects = n;
    }

    /// Mark the live session closed, as the driver would after a socket
    /// error.
    pub fn close_live_session(&self) {
        self.lock().live_closed = true;
    }

    /// Drop the server side of the live session without the client
    /// noticing: the next statement fails with a connectivity error.
    pub fn sever_live_session(&self) {
        self.lock().severed = true;
    }

    /// Force the live session's transaction status.
    pub fn set_live_status(&self, status: TransactionStatus) {
        self.lock().live_status = Some(status);
    }

    /// ID of the live session, if any.
    pub fn live_session(&self) -> Option<u64> {
        self.lock().live
    }

    /// Transaction status of the live session.
    pub fn live_status(&self) -> TransactionStatus {
        self.lock().live_status.unwrap_or(TransactionStatus::Unknown)
    }

    /// Successful connects so far.
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Sessions closed so far.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Rollbacks issued so far.
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Commits issued so far.
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// Every statement executed so far, oldest first.
    pub fn executed(&self) -> Vec<Executed> {
        self.lock().executed.clone()
    }

    /// Connection target used by each successful connect.
    pub fn targets(&self) -> Vec<String> {
        self.lock().targets.clone()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> Result<MockSession, DbError> {
        let mut state = self.lock();
        if state.fail_connects > 0 {
            state.fail_connects = state.fail_connects.saturating_sub(1);
            return Err(DbError::Connectivity("connection refused".to_owned()));
        }
        state.next_id = state.next_id.saturating_add(1);
        let id = state.next_id;
        state.live = Some(id);
        state.live_status = Some(TransactionStatus::Idle);
        state.live_closed = false;
        state.severed = false;
        state.connects = state.connects.saturating_add(1);
        let target = state.target.clone();
        state.targets.push(target);
        drop(state);

        Ok(MockSession {
            id,
            state: Arc::clone(&self.state),
        })
    }

    fn target(&self) -> String {
        self.lock().target.clone()
    }
}

/// A session handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockSession {
    id: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_state(&self) -> Result<MutexGuard<'_, MockState>, DbError> {
        let state = self.lock();
        if state.live == Some(self.id) && !state.live_closed {
            Ok(state)
        } else {
            Err(DbError::Connectivity("session is closed".to_owned()))
        }
    }
}

impl Session for MockSession {
    fn is_closed(&self) -> bool {
        let state = self.lock();
        state.live != Some(self.id) || state.live_closed
    }

    fn transaction_status(&self) -> TransactionStatus {
        let state = self.lock();
        if state.live == Some(self.id) {
            state.live_status.unwrap_or(TransactionStatus::Unknown)
        } else {
            TransactionStatus::Unknown
        }
    }

    async fn execute(
        &mut self,
        statement: &str,
        params: Option<&Params>,
        fetch: bool,
    ) -> Result<Option<Vec<Row>>, DbError> {
        let mut state = self.live_state()?;
        if let Some(p) = params {
            bind_named(statement, p)?;
        }
        state.executed.push(Executed {
            statement: statement.to_owned(),
            params: params.cloned(),
            fetch,
        });

        if state.severed {
            state.live_status = Some(TransactionStatus::Unknown);
            return Err(DbError::Connectivity(
                "server closed the connection unexpectedly".to_owned(),
            ));
        }

        match state.script.pop_front() {
            Some(Scripted::Connectivity(message)) => {
                state.live_status = Some(TransactionStatus::Unknown);
                Err(DbError::Connectivity(message))
            }
            Some(Scripted::Statement(message)) => {
                state.live_status = Some(TransactionStatus::InError);
                Err(DbError::statement(message))
            }
            Some(Scripted::Rows(rows)) => {
                state.live_status = Some(TransactionStatus::InTransaction);
                Ok(fetch.then_some(rows))
            }
            Some(Scripted::Ack) | None => {
                state.live_status = Some(TransactionStatus::InTransaction);
                Ok(fetch.then(Vec::new))
            }
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        let mut state = self.live_state()?;
        state.commits = state.commits.saturating_add(1);
        state.live_status = Some(TransactionStatus::Idle);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        let mut state = self.live_state()?;
        state.rollbacks = state.rollbacks.saturating_add(1);
        state.live_status = Some(TransactionStatus::Idle);
        Ok(())
    }

    async fn close(self) {
        let mut state = self.lock();
        state.closes = state.closes.saturating_add(1);
        if state.live == Some(self.id) {
            state.live = None;
            state.live_status = None;
        }
    }
}
