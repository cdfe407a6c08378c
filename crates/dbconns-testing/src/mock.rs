//! Scriptable in-memory connector.
//!
//! [`MockConnector`] implements [`Connector`] without any network I/O. A
//! [`MockControl`] handle, shared with every connection the connector
//! creates, lets a test inject failures and inspect what happened:
//!
//! - make the next N connection attempts fail
//! - break connections so that pings and calls fail
//! - script results or server errors per procedure
//! - record every call with its arguments
//! - count connects, closes, pings, commits and rollbacks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbconns_client::{CallStatement, Connection, Connector, Error, Result, Row, SqlValue};
use parking_lot::Mutex;

/// Scripted outcome of a procedure call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these rows.
    Rows(Vec<Row>),
    /// Fail with a server error.
    ServerError {
        /// SQLSTATE reported by the "server".
        code: String,
        /// Error message.
        message: String,
    },
}

impl MockResponse {
    /// Respond with rows.
    #[must_use]
    pub fn rows(rows: Vec<Row>) -> Self {
        Self::Rows(rows)
    }

    /// Respond with no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::Rows(Vec::new())
    }

    /// Respond with a server error.
    #[must_use]
    pub fn server_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServerError {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A procedure call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Id of the connection the call ran on.
    pub connection_id: u64,
    /// Procedure name.
    pub procedure: String,
    /// Bound arguments.
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: AtomicU64,
    fail_connects: AtomicUsize,
    fail_rollbacks: AtomicBool,
    fail_commits: AtomicBool,

    connects: AtomicUsize,
    closes: AtomicUsize,
    pings: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,

    connect_delay: Mutex<Option<Duration>>,
    ping_delay: Mutex<Option<Duration>>,
    open: Mutex<HashSet<u64>>,
    broken: Mutex<HashSet<u64>>,
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockState {
    fn is_broken(&self, id: u64) -> bool {
        self.broken.lock().contains(&id)
    }
}

/// Handle for scripting and inspecting a [`MockConnector`].
#[derive(Debug, Clone)]
pub struct MockControl {
    state: Arc<MockState>,
}

impl MockControl {
    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Delay every connection attempt.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock() = Some(delay);
    }

    /// Delay every ping, including the pool's health checks.
    pub fn set_ping_delay(&self, delay: Duration) {
        *self.state.ping_delay.lock() = Some(delay);
    }

    /// Break every currently open connection. Pings and calls on them fail.
    pub fn break_open_connections(&self) {
        let open = self.state.open.lock().clone();
        self.state.broken.lock().extend(open);
    }

    /// Break one connection by id.
    pub fn break_connection(&self, id: u64) {
        self.state.broken.lock().insert(id);
    }

    /// Make rollbacks fail.
    pub fn fail_rollbacks(&self, fail: bool) {
        self.state.fail_rollbacks.store(fail, Ordering::SeqCst);
    }

    /// Make commits fail.
    pub fn fail_commits(&self, fail: bool) {
        self.state.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Script the response for a procedure.
    pub fn respond(&self, procedure: impl Into<String>, response: MockResponse) {
        self.state
            .responses
            .lock()
            .insert(procedure.into(), response);
    }

    /// Every call observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    /// Calls to one procedure.
    #[must_use]
    pub fn calls_to(&self, procedure: &str) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.procedure == procedure)
            .cloned()
            .collect()
    }

    /// Ids of connections that are open (created and not yet closed).
    #[must_use]
    pub fn open_connections(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.state.open.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Successful connection attempts.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections closed.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Pings performed.
    #[must_use]
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Commits performed.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    /// Rollbacks performed.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }
}

/// In-memory [`Connector`] for tests.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    /// Create a connector with no scripted behavior.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Control handle sharing this connector's state.
    #[must_use]
    pub fn control(&self) -> MockControl {
        MockControl {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .state
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::Connection("mock: connection refused".into()));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.open.lock().insert(id);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection_id = id, "mock connection opened");

        Ok(MockConnection {
            id,
            state: Arc::clone(&self.state),
            dirty: false,
        })
    }

    fn describe(&self) -> String {
        "mock://test".to_string()
    }
}

/// Connection produced by [`MockConnector`].
#[derive(Debug)]
pub struct MockConnection {
    id: u64,
    state: Arc<MockState>,
    dirty: bool,
}

impl MockConnection {
    /// Identifier of this connection, unique per connector.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn ping(&mut self) -> Result<()> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.ping_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.is_broken(self.id) {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    async fn call(&mut self, statement: &CallStatement) -> Result<Vec<Row>> {
        if self.state.is_broken(self.id) {
            return Err(Error::ConnectionClosed);
        }

        self.state.calls.lock().push(RecordedCall {
            connection_id: self.id,
            procedure: statement.procedure().to_string(),
            params: statement.params().to_vec(),
        });
        self.dirty = true;

        let response = self
            .state
            .responses
            .lock()
            .get(statement.procedure())
            .cloned();
        match response {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::ServerError { code, message }) => {
                Err(Error::Server { code, message })
            }
            None => Ok(Vec::new()),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        if self.state.fail_commits.load(Ordering::SeqCst) || self.state.is_broken(self.id) {
            return Err(Error::ConnectionClosed);
        }
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        self.dirty = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.state.fail_rollbacks.load(Ordering::SeqCst) || self.state.is_broken(self.id) {
            return Err(Error::ConnectionClosed);
        }
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.dirty = false;
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    async fn close(self) -> Result<()> {
        self.state.open.lock().remove(&self.id);
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection_id = self.id, "mock connection closed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_next_connects() {
        let connector = MockConnector::new();
        let control = connector.control();
        control.fail_next_connects(2);

        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_err());
        let conn = connector.connect().await.unwrap();
        assert_eq!(conn.id(), 1);
        assert_eq!(control.connects(), 1);
    }

    #[tokio::test]
    async fn test_scripted_responses_and_recording() {
        let connector = MockConnector::new();
        let control = connector.control();
        control.respond(
            "get_user_stats",
            MockResponse::rows(vec![Row::from_pairs([("TotalUsers", 3_i64)])]),
        );
        control.respond(
            "set_user_insert",
            MockResponse::server_error("45000", "duplicate email"),
        );

        let mut conn = connector.connect().await.unwrap();
        let rows = conn
            .call(&CallStatement::without_params("get_user_stats").unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(conn.is_dirty());

        let err = conn
            .call(&CallStatement::new("set_user_insert", vec![SqlValue::from("a@b.com")]).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_server_error("45000"));

        let calls = control.calls_to("set_user_insert");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params, vec![SqlValue::from("a@b.com")]);
    }

    #[tokio::test]
    async fn test_broken_connection() {
        let connector = MockConnector::new();
        let control = connector.control();
        let mut conn = connector.connect().await.unwrap();
        conn.ping().await.unwrap();

        control.break_open_connections();
        assert!(conn.ping().await.is_err());
        assert_eq!(control.pings(), 2);

        // New connections are healthy.
        let mut fresh = connector.connect().await.unwrap();
        fresh.ping().await.unwrap();

        conn.close().await.unwrap();
        assert_eq!(control.open_connections(), vec![2]);
    }
}
