//! Database session capability traits.
//!
//! The pool never talks to a driver directly. It creates sessions through a
//! [`Connector`] and uses them only through [`Connection`], which keeps the
//! pool testable without a server and lets other backends plug in.
//!
//! Both traits use `#[async_trait]` so that their futures are `Send` and the
//! pool can hand connections across Tokio worker threads.

use async_trait::async_trait;

use crate::call::CallStatement;
use crate::error::Result;
use crate::row::Row;

/// A single authenticated session to the database.
///
/// A connection is used by one task at a time; every method takes
/// `&mut self` (or `self`) accordingly.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Check that the session is alive.
    ///
    /// Implementations should perform a real round trip to the server.
    async fn ping(&mut self) -> Result<()>;

    /// Execute a procedure call and collect every row it produced.
    ///
    /// Implementations render the statement in their own placeholder style
    /// and bind [`CallStatement::params`] through the driver.
    ///
    /// A call that produces no result set returns an empty vector.
    async fn call(&mut self, statement: &CallStatement) -> Result<Vec<Row>>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Whether the session may hold uncommitted work.
    ///
    /// Set by [`Connection::call`], cleared by commit and rollback.
    fn is_dirty(&self) -> bool;

    /// Close the session gracefully.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Factory for new sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Session type produced by this connector.
    type Connection: Connection;

    /// Open and initialize a new session.
    async fn connect(&self) -> Result<Self::Connection>;

    /// Short description of the target for logs (no secrets).
    fn describe(&self) -> String {
        String::from("database")
    }
}
